use std::fmt;

use serde::{Deserialize, Serialize};

/// Codes that describe a caller mistake rather than a failure on our side.
const CLIENT_ERROR_CODES: [&str; 3] = ["UPLOAD_INVALID", "QUERY_INVALID", "NO_KNOWLEDGE_BASE"];

/// Failure raised anywhere between an upload arriving and an answer going back.
///
/// `code` is a stable tag such as `INDEX_EMPTY`; `message` is written for the
/// person who uploaded or asked. `details` carries the diagnostic context
/// (paths, upstream status, offending ordinal).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    /// Upstream throttling, 5xx or transport trouble; the same request may succeed later.
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(self, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..self
        }
    }

    pub fn with_retryable(self, retryable: bool) -> Self {
        Self { retryable, ..self }
    }

    /// Bad upload, empty question, or nothing ingested yet.
    pub fn is_client_error(&self) -> bool {
        CLIENT_ERROR_CODES.contains(&self.code.as_str())
    }

    pub fn http_status(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
