use askpdf_core::error::AppError;

/// Chat-completion gateway: one system instruction, one user message, one reply.
pub trait Llm: Send + Sync {
    fn chat(&self, system: &str, user: &str) -> Result<String, AppError>;
}

pub mod azure_llm;
