pub const SYSTEM_INSTRUCTION: &str = "You are AI Assistant. Provide clear, accurate, and concise answers strictly based on the context provided. Ensure your responses are balanced in length, neither too brief nor overly detailed, delivering essential information effectively and efficiently. Avoid including any information not supported by the given context.";

pub fn user_message(context: &str, question: &str) -> String {
    format!(
        "Context:\n{context}\n\nUser Question: {question}\n\nAnswer using only the given context."
    )
}
