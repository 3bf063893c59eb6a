use askpdf_core::error::AppError;

use crate::index::SearchHit;
use crate::llm::Llm;

pub mod prompts;

/// Retrieved chunk texts in rank order, separated by a blank line.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Asks the model to answer `question` from `context` alone and returns the trimmed reply.
pub fn generate_answer(llm: &dyn Llm, context: &str, question: &str) -> Result<String, AppError> {
    let user = prompts::user_message(context, question);
    let reply = llm.chat(prompts::SYSTEM_INSTRUCTION, &user).map_err(|e| {
        if e.code == "AI_GENERATION_FAILED" {
            e
        } else {
            AppError::new("AI_GENERATION_FAILED", "Failed to generate answer")
                .with_details(e.to_string())
                .with_retryable(e.retryable)
        }
    })?;

    let answer = reply.trim();
    if answer.is_empty() {
        return Err(AppError::new(
            "AI_GENERATION_FAILED",
            "Answer generator returned an empty response",
        ));
    }
    Ok(answer.to_string())
}
