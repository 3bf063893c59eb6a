use askpdf_core::chunking::MAX_EMBED_INPUT_CHARS;
use askpdf_core::error::AppError;

use crate::embeddings::Embedder;
use crate::index::{SearchHit, VectorIndex};

pub const DEFAULT_TOP_K: usize = 4;

/// Embeds `query` and returns the `top_k` nearest chunks, nearest first.
pub fn retrieve(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Result<Vec<SearchHit>, AppError> {
    let q = query.trim();
    if q.is_empty() {
        return Err(AppError::new("QUERY_INVALID", "Question must not be empty"));
    }
    if q.chars().count() > MAX_EMBED_INPUT_CHARS {
        return Err(AppError::new("QUERY_INVALID", "Question is too long")
            .with_details(format!("max_chars={MAX_EMBED_INPUT_CHARS}")));
    }
    if index.is_empty() {
        return Err(AppError::new(
            "INDEX_EMPTY",
            "Index has no documents to search",
        ));
    }

    let qv = embedder.embed(q)?;
    let hits = index.search(&qv, top_k.max(1))?;
    tracing::debug!(
        "retrieved {} chunks (nearest distance {:?})",
        hits.len(),
        hits.first().map(|h| h.distance)
    );
    Ok(hits)
}
