use askpdf_core::chunking::Chunk;
use askpdf_core::error::AppError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::embeddings::Embedder;

use super::model::{IndexBuildInput, IndexManifest, IndexedChunk, SearchHit, INDEX_FORMAT_VERSION};
use super::similarity;

/// Flat, exact nearest-neighbour index over chunk embeddings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    manifest: IndexManifest,
    documents: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Embeds every chunk in order, one gateway call per chunk.
    ///
    /// Fails without a partial result: the first embedding error, malformed vector,
    /// or dimension disagreement aborts the whole build.
    pub fn build(
        chunks: &[Chunk],
        embedder: &dyn Embedder,
        input: IndexBuildInput,
    ) -> Result<Self, AppError> {
        if chunks.is_empty() {
            return Err(AppError::new(
                "INDEX_EMPTY",
                "No chunks available; nothing to index",
            ));
        }

        let mut dims: Option<usize> = embedder.dims();
        let mut documents: Vec<IndexedChunk> = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            tracing::debug!("embedding chunk {} of {}", chunk.ordinal + 1, chunks.len());
            let v = embedder.embed(&chunk.text).map_err(|e| {
                AppError::new("AI_EMBEDDINGS_FAILED", "Failed to compute embeddings")
                    .with_details(format!("ordinal={}; err={}", chunk.ordinal, e))
                    .with_retryable(e.retryable)
            })?;
            if v.is_empty() || !similarity::all_finite(&v) {
                return Err(AppError::new(
                    "AI_EMBEDDINGS_FAILED",
                    "Embedding contains no values or non-finite values",
                )
                .with_details(format!("ordinal={}", chunk.ordinal)));
            }
            match dims {
                Some(d) if d != v.len() => {
                    return Err(AppError::new(
                        "AI_EMBEDDINGS_FAILED",
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!(
                        "expected={}; got={}; ordinal={}",
                        d,
                        v.len(),
                        chunk.ordinal
                    )));
                }
                Some(_) => {}
                None => dims = Some(v.len()),
            }

            documents.push(IndexedChunk {
                ordinal: chunk.ordinal,
                start_char: chunk.start_char as u64,
                text_sha256: text_digest(&chunk.text),
                text: chunk.text.clone(),
                vector: v,
            });
        }

        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            model: embedder.model().to_string(),
            dims: dims.unwrap_or_default() as u32,
            chunk_count: documents.len() as u32,
            chunk_size: input.chunk_size as u32,
            chunk_overlap: input.chunk_overlap as u32,
            built_at: input.built_at,
            source_label: input.source_label,
        };
        Ok(Self {
            manifest,
            documents,
        })
    }

    /// Reassembles an index from persisted parts, checking that they agree with each other.
    pub fn from_parts(manifest: IndexManifest, documents: Vec<IndexedChunk>) -> Result<Self, AppError> {
        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(AppError::new(
                "INDEX_PERSIST_FAILED",
                "Unsupported index format version",
            )
            .with_details(format!(
                "expected={}; got={}",
                INDEX_FORMAT_VERSION, manifest.format_version
            )));
        }
        if manifest.chunk_count as usize != documents.len() {
            return Err(AppError::new(
                "INDEX_PERSIST_FAILED",
                "Index manifest chunk count does not match stored documents",
            )
            .with_details(format!(
                "manifest={}; documents={}",
                manifest.chunk_count,
                documents.len()
            )));
        }
        for d in documents.iter() {
            if d.vector.len() != manifest.dims as usize || !similarity::all_finite(&d.vector) {
                return Err(AppError::new(
                    "INDEX_PERSIST_FAILED",
                    "Stored vector does not match index dimensions",
                )
                .with_details(format!(
                    "ordinal={}; expected={}; got={}",
                    d.ordinal,
                    manifest.dims,
                    d.vector.len()
                )));
            }
            if text_digest(&d.text) != d.text_sha256 {
                return Err(AppError::new(
                    "INDEX_PERSIST_FAILED",
                    "Stored chunk text does not match its digest",
                )
                .with_details(format!("ordinal={}", d.ordinal)));
            }
        }
        Ok(Self {
            manifest,
            documents,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn documents(&self) -> &[IndexedChunk] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Up to `k` documents ordered by ascending distance; ties keep document order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, AppError> {
        if self.documents.is_empty() {
            return Err(AppError::new(
                "INDEX_EMPTY",
                "Index has no documents to search",
            ));
        }
        let dims = self.manifest.dims as usize;
        if query.len() != dims {
            return Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={dims}; query_dims={}", query.len())));
        }
        if !similarity::all_finite(query) {
            return Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Query embedding contains non-finite values",
            ));
        }

        let mut scored: Vec<(usize, f32)> = self
            .documents
            .iter()
            .enumerate()
            .map(|(i, d)| (i, similarity::squared_l2_distance(query, &d.vector)))
            .collect();
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(self.documents[a.0].ordinal.cmp(&self.documents[b.0].ordinal))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| {
                let d = &self.documents[i];
                SearchHit {
                    ordinal: d.ordinal,
                    start_char: d.start_char,
                    text: d.text.clone(),
                    distance,
                }
            })
            .collect())
    }
}

fn text_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
