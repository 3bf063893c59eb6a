use serde::{Deserialize, Serialize};

pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Embedding fingerprint and build metadata persisted with every index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub model: String,
    pub dims: u32,
    pub chunk_count: u32,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub built_at: String, // RFC3339
    #[serde(default)]
    pub source_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedChunk {
    pub ordinal: u32,
    pub start_char: u64,
    pub text: String,
    pub text_sha256: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub ordinal: u32,
    pub start_char: u64,
    pub text: String,
    /// Squared Euclidean distance to the query vector; smaller is nearer.
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct IndexBuildInput {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub built_at: String,
    pub source_label: Option<String>,
}
