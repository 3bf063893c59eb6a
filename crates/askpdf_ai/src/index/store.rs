use std::fs;
use std::path::{Path, PathBuf};

use askpdf_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;

use super::model::{IndexManifest, IndexedChunk};
use super::vector::VectorIndex;

/// The single durable index location. Every save replaces the previous index wholesale.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    manifest: &'a IndexManifest,
    documents: &'a [IndexedChunk],
}

#[derive(Deserialize)]
struct IndexFile {
    manifest: IndexManifest,
    documents: Vec<IndexedChunk>,
}

#[derive(Deserialize)]
struct ManifestOnly {
    manifest: IndexManifest,
}

impl IndexStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new("INDEX_PERSIST_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })
    }

    pub fn exists(&self) -> bool {
        self.index_path().is_file()
    }

    /// Writes to a temp file and renames it over the old index, so readers see
    /// either the previous index or the new one.
    pub fn save(&self, index: &VectorIndex) -> Result<(), AppError> {
        self.ensure_dirs()?;
        let path = self.index_path();
        let tmp = path.with_extension("tmp");
        let file = IndexFileRef {
            manifest: index.manifest(),
            documents: index.documents(),
        };
        let json = serde_json::to_vec(&file).map_err(|e| {
            AppError::new("INDEX_PERSIST_FAILED", "Failed to encode index")
                .with_details(e.to_string())
        })?;
        if let Err(e) = fs::write(&tmp, &json) {
            let _ = fs::remove_file(&tmp);
            return Err(AppError::new("INDEX_PERSIST_FAILED", "Failed to write index")
                .with_details(format!("path={}; err={}", tmp.display(), e)));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(AppError::new("INDEX_PERSIST_FAILED", "Failed to finalize index write")
                .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e)));
        }
        tracing::info!(
            "saved index to {} ({} documents, {} dims)",
            path.display(),
            index.len(),
            index.manifest().dims
        );
        Ok(())
    }

    fn read_bytes(&self) -> Result<Vec<u8>, AppError> {
        let path = self.index_path();
        fs::read(&path).map_err(|e| {
            AppError::new("INDEX_PERSIST_FAILED", "Failed to read index")
                .with_details(format!("path={}; err={}", path.display(), e))
        })
    }

    /// Manifest of the stored index without decoding any vectors.
    pub fn read_manifest(&self) -> Result<IndexManifest, AppError> {
        let bytes = self.read_bytes()?;
        let file: ManifestOnly = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new("INDEX_PERSIST_FAILED", "Failed to decode index manifest")
                .with_details(format!("path={}; err={}", self.index_path().display(), e))
        })?;
        Ok(file.manifest)
    }

    /// Loads the stored index, rejecting one built with a different embedding fingerprint.
    pub fn load(&self, embedder: &dyn Embedder) -> Result<VectorIndex, AppError> {
        let bytes = self.read_bytes()?;
        let file: IndexFile = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new("INDEX_PERSIST_FAILED", "Failed to decode index")
                .with_details(format!("path={}; err={}", self.index_path().display(), e))
        })?;

        if file.manifest.model != embedder.model() {
            return Err(AppError::new(
                "INDEX_PERSIST_FAILED",
                "Stored index was built with a different embedding model",
            )
            .with_details(format!(
                "index_model={}; embedder_model={}",
                file.manifest.model,
                embedder.model()
            )));
        }
        if let Some(d) = embedder.dims() {
            if d != file.manifest.dims as usize {
                return Err(AppError::new(
                    "INDEX_PERSIST_FAILED",
                    "Stored index dimensions do not match the embedder",
                )
                .with_details(format!("index_dims={}; embedder_dims={}", file.manifest.dims, d)));
            }
        }

        let index = VectorIndex::from_parts(file.manifest, file.documents)?;
        tracing::info!(
            "loaded index from {} ({} documents, model {})",
            self.index_path().display(),
            index.len(),
            index.manifest().model
        );
        Ok(index)
    }
}
