//! Fixed-size, overlapping character windows.
//!
//! Boundaries are counted in characters (Unicode scalar values), not bytes and
//! not tokens. Windows are not content aware and may split a word or sentence.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_CHUNK_SIZE: usize = 300;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
/// Longest text sent to the embedding gateway in one call. Chunks and questions above it are rejected, never cut.
pub const MAX_EMBED_INPUT_CHARS: usize = 8_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingPolicy {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingPolicy {
    /// Rejects any policy whose stride (`chunk_size - overlap`) would not advance.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::new(
                "CHUNKING_CONFIG_INVALID",
                "Chunk size must be greater than zero",
            ));
        }
        if overlap >= chunk_size {
            return Err(AppError::new(
                "CHUNKING_CONFIG_INVALID",
                "Chunk overlap must be smaller than the chunk size",
            )
            .with_details(format!("chunk_size={chunk_size}; overlap={overlap}")));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    pub fn split(&self, text: &str) -> Vec<Chunk> {
        // Byte offset of every character start, plus the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = bounds.len() - 1;

        let mut out = Vec::new();
        let mut start = 0usize;
        let mut ordinal: u32 = 0;
        while start < char_len {
            let end = std::cmp::min(start + self.chunk_size, char_len);
            out.push(Chunk {
                ordinal,
                start_char: start,
                text: text[bounds[start]..bounds[end]].to_string(),
            });
            ordinal += 1;
            start += self.stride();
        }
        out
    }
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub ordinal: u32,
    pub start_char: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>, AppError> {
    Ok(ChunkingPolicy::new(chunk_size, overlap)?.split(text))
}
