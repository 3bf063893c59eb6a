//! The process-wide knowledge base: at most one live index plus its fixed durable location.
//!
//! Lifecycle: absent at startup, loaded lazily from disk on the first question if
//! a stored index exists, and replaced wholesale by every successful ingestion.
//! Ingestions are serialised; questions keep reading the previous index until
//! the replacement is both built and persisted.

use std::sync::{Arc, Mutex, RwLock};

use askpdf_core::chunking::ChunkingPolicy;
use askpdf_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::answer::{build_context, generate_answer};
use crate::embeddings::Embedder;
use crate::index::{IndexBuildInput, IndexStore, VectorIndex};
use crate::llm::Llm;
use crate::retrieve::{retrieve, DEFAULT_TOP_K};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub chunk_count: u32,
    pub dims: u32,
    pub model: String,
    pub built_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeBaseStatus {
    /// An index is available, in memory or on disk.
    pub ready: bool,
    /// The index is already held in memory.
    pub loaded: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub chunk_count: u32,
    pub built_at: Option<String>,
    pub source_label: Option<String>,
}

pub struct KnowledgeBase {
    store: IndexStore,
    policy: ChunkingPolicy,
    top_k: usize,
    current: RwLock<Option<Arc<VectorIndex>>>,
    ingest_lock: Mutex<()>,
}

impl KnowledgeBase {
    pub fn new(store: IndexStore, policy: ChunkingPolicy, top_k: usize) -> Self {
        Self {
            store,
            policy,
            top_k: top_k.max(1),
            current: RwLock::new(None),
            ingest_lock: Mutex::new(()),
        }
    }

    pub fn with_defaults(store: IndexStore) -> Self {
        Self::new(store, ChunkingPolicy::default(), DEFAULT_TOP_K)
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn policy(&self) -> ChunkingPolicy {
        self.policy
    }

    pub fn current(&self) -> Option<Arc<VectorIndex>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Chunks, embeds, persists and then publishes a new index.
    ///
    /// Any failure leaves the previously published index (memory and disk) in place.
    pub fn ingest(
        &self,
        embedder: &dyn Embedder,
        raw_text: &str,
        source_label: Option<String>,
        built_at: &str,
    ) -> Result<IngestSummary, AppError> {
        let _guard = self.ingest_lock.lock().unwrap_or_else(|e| e.into_inner());

        if raw_text.trim().is_empty() {
            return Err(AppError::new(
                "PDF_EXTRACTION_FAILED",
                "No text could be extracted from the document",
            ));
        }

        let chunks = self.policy.split(raw_text);
        tracing::info!(
            "ingesting {} chunks (size {}, overlap {}) from {}",
            chunks.len(),
            self.policy.chunk_size(),
            self.policy.overlap(),
            source_label.as_deref().unwrap_or("<unnamed>")
        );

        let index = VectorIndex::build(
            &chunks,
            embedder,
            IndexBuildInput {
                chunk_size: self.policy.chunk_size(),
                chunk_overlap: self.policy.overlap(),
                built_at: built_at.to_string(),
                source_label,
            },
        )?;
        self.store.save(&index)?;

        let summary = IngestSummary {
            chunk_count: index.manifest().chunk_count,
            dims: index.manifest().dims,
            model: index.manifest().model.clone(),
            built_at: index.manifest().built_at.clone(),
        };

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let replaced = current.is_some();
        *current = Some(Arc::new(index));
        tracing::info!(
            "knowledge base {} with {} chunks",
            if replaced { "replaced" } else { "created" },
            summary.chunk_count
        );
        Ok(summary)
    }

    /// The live index, loading it from the fixed location the first time it is needed.
    pub fn current_or_load(&self, embedder: &dyn Embedder) -> Result<Arc<VectorIndex>, AppError> {
        if let Some(index) = self.current() {
            return Ok(index);
        }

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = current.as_ref() {
            return Ok(Arc::clone(index));
        }
        if !self.store.exists() {
            return Err(AppError::new(
                "NO_KNOWLEDGE_BASE",
                "No knowledge base available. Please upload a PDF first.",
            ));
        }
        let index = Arc::new(self.store.load(embedder)?);
        *current = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Retrieves the nearest chunks for `question` and has the model answer from them alone.
    pub fn answer(
        &self,
        embedder: &dyn Embedder,
        llm: &dyn Llm,
        question: &str,
    ) -> Result<String, AppError> {
        let index = self.current_or_load(embedder)?;
        let hits = retrieve(&index, embedder, question, self.top_k)?;
        let context = build_context(&hits);
        let answer = generate_answer(llm, &context, question.trim())?;
        tracing::info!(
            "answered question using {} chunks ({} chars)",
            hits.len(),
            answer.chars().count()
        );
        Ok(answer)
    }

    pub fn status(&self) -> Result<KnowledgeBaseStatus, AppError> {
        if let Some(index) = self.current() {
            let m = index.manifest();
            return Ok(KnowledgeBaseStatus {
                ready: true,
                loaded: true,
                model: Some(m.model.clone()),
                dims: Some(m.dims),
                chunk_count: m.chunk_count,
                built_at: Some(m.built_at.clone()),
                source_label: m.source_label.clone(),
            });
        }
        if !self.store.exists() {
            return Ok(KnowledgeBaseStatus {
                ready: false,
                loaded: false,
                model: None,
                dims: None,
                chunk_count: 0,
                built_at: None,
                source_label: None,
            });
        }
        let m = self.store.read_manifest()?;
        Ok(KnowledgeBaseStatus {
            ready: true,
            loaded: false,
            model: Some(m.model),
            dims: Some(m.dims),
            chunk_count: m.chunk_count,
            built_at: Some(m.built_at),
            source_label: m.source_label,
        })
    }
}
