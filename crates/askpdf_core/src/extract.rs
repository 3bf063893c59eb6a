use std::path::Path;
use std::process::Command;

use crate::error::AppError;

/// Turns an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, AppError>;
}

/// Extracts PDF text with the poppler `pdftotext` binary, page by page in reading order.
#[derive(Debug, Clone)]
pub struct PdftotextExtractor {
    program: String,
}

impl PdftotextExtractor {
    pub fn new() -> Self {
        Self {
            program: "pdftotext".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for PdftotextExtractor {
    fn extract(&self, path: &Path) -> Result<String, AppError> {
        if !path.is_file() {
            return Err(AppError::new("PDF_EXTRACTION_FAILED", "PDF file not found")
                .with_details(format!("path={}", path.display())));
        }

        tracing::debug!("extracting text from {} with {}", path.display(), self.program);
        let output = Command::new(&self.program)
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .output()
            .map_err(|e| {
                AppError::new("PDF_EXTRACTION_FAILED", "Failed to run PDF text extractor")
                    .with_details(format!("program={}; err={}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(AppError::new(
                "PDF_EXTRACTION_FAILED",
                "PDF text extractor reported an error",
            )
            .with_details(format!(
                "status={}; stderr={}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // pdftotext separates pages with form feeds.
        let text = String::from_utf8_lossy(&output.stdout).replace('\u{c}', "");
        tracing::debug!("extracted {} characters from {}", text.chars().count(), path.display());
        Ok(text)
    }
}
