pub mod answer;
pub mod azure;
pub mod embeddings;
pub mod index;
pub mod knowledge_base;
pub mod llm;
pub mod retrieve;
