use std::time::Duration;

use askpdf_core::config::AzureSettings;
use askpdf_core::error::AppError;
use serde::Deserialize;

/// Connection details shared by the embeddings and chat deployments of one Azure OpenAI resource.
#[derive(Clone)]
pub struct AzureOpenAiClient {
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl std::fmt::Debug for AzureOpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of a single POST, already split into what callers need to map into their own error codes.
pub(crate) enum CallError {
    Encode(String),
    Status { status: u16, body: String },
    Transport(String),
}

impl CallError {
    pub(crate) fn into_app_error(self, code: &str, action: &str) -> AppError {
        match self {
            CallError::Encode(e) => AppError::new(code, format!("Failed to encode {action} request"))
                .with_details(e),
            CallError::Status { status, body } => {
                AppError::new(code, format!("{action} request failed"))
                    .with_details(format!("status={status}; body={}", summarize_error_body(&body)))
                    .with_retryable(status == 429 || status >= 500)
            }
            CallError::Transport(e) => {
                AppError::new(code, format!("Failed to call {action} endpoint"))
                    .with_details(e)
                    .with_retryable(true)
            }
        }
    }
}

impl AzureOpenAiClient {
    pub fn new(endpoint: &str, api_key: &str, api_version: &str) -> Result<Self, AppError> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "Azure OpenAI endpoint must be an http(s) URL",
            )
            .with_details(format!("endpoint={endpoint}")));
        }
        if endpoint.contains('?') || endpoint.contains('#') {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "Azure OpenAI endpoint must not carry a query or fragment",
            )
            .with_details(format!("endpoint={endpoint}")));
        }
        if api_key.trim().is_empty() {
            return Err(AppError::new("CONFIG_MISSING", "Azure OpenAI API key is required"));
        }
        if api_version.trim().is_empty() {
            return Err(AppError::new("CONFIG_MISSING", "Azure OpenAI API version is required"));
        }

        Ok(Self {
            endpoint,
            api_key: api_key.trim().to_string(),
            api_version: api_version.trim().to_string(),
        })
    }

    pub fn from_settings(settings: &AzureSettings) -> Result<Self, AppError> {
        Self::new(&settings.endpoint, &settings.api_key, &settings.api_version)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, deployment, operation, self.api_version
        )
    }

    pub(crate) fn post_json<T: serde::Serialize>(
        &self,
        url: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<ureq::Response, CallError> {
        let value = serde_json::to_value(body).map_err(|e| CallError::Encode(e.to_string()))?;
        let resp = ureq::post(url)
            .timeout(timeout)
            .set("api-key", &self.api_key)
            .send_json(value);

        match resp {
            Ok(r) if r.status() == 200 => Ok(r),
            Ok(r) => {
                let status = r.status();
                Err(CallError::Status {
                    status,
                    body: r.into_string().unwrap_or_default(),
                })
            }
            Err(ureq::Error::Status(status, r)) => Err(CallError::Status {
                status,
                body: r.into_string().unwrap_or_default(),
            }),
            Err(e) => Err(CallError::Transport(e.to_string())),
        }
    }
}

/// Prefer Azure's structured `{ "error": { code, message } }`; fall back to a bounded raw body.
fn summarize_error_body(body: &str) -> String {
    if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) {
        let code = env.error.code.unwrap_or_default();
        let message = env.error.message.unwrap_or_default();
        return format!("{code}: {message}");
    }
    body.chars().take(300).collect()
}
