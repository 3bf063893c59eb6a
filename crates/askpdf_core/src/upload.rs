use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AppError;

static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Accepts only names that end in `.pdf` (any case). The suffix is the whole check.
pub fn validate_pdf_filename(filename: &str) -> Result<(), AppError> {
    if filename.trim().is_empty() || !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::new("UPLOAD_INVALID", "Please upload a PDF file.")
            .with_details(format!("filename={filename}")));
    }
    Ok(())
}

/// Final path component of a client-supplied name. Rejects names that reduce to nothing.
fn safe_file_name(filename: &str) -> Result<String, AppError> {
    let normalized = filename.replace('\\', "/");
    let name = normalized
        .rsplit('/')
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::new("UPLOAD_INVALID", "Please upload a PDF file.")
            .with_details(format!("filename={filename}")));
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new("UPLOAD_STORE_FAILED", "Failed to create uploads directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })
    }

    /// Validates the name and writes the bytes under a private staging name.
    ///
    /// Concurrent uploads of the same name never share a staged file; the last
    /// one to `commit` owns the final name.
    pub fn stage(&self, filename: &str, bytes: &[u8]) -> Result<StagedUpload, AppError> {
        validate_pdf_filename(filename)?;
        let name = safe_file_name(filename)?;
        self.ensure_dirs()?;

        let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
        let staged = self
            .root
            .join(format!(".{}.{}-{}.part", name, std::process::id(), seq));
        fs::write(&staged, bytes).map_err(|e| {
            let _ = fs::remove_file(&staged);
            AppError::new("UPLOAD_STORE_FAILED", "Failed to save uploaded file")
                .with_details(format!("path={}; err={}", staged.display(), e))
        })?;
        tracing::debug!("staged upload {} ({} bytes)", staged.display(), bytes.len());
        Ok(StagedUpload {
            staged,
            dest: self.root.join(&name),
            name,
            committed: false,
        })
    }
}

/// Upload bytes held under a staging name. Dropped uncommitted, the staged file is removed.
#[derive(Debug)]
pub struct StagedUpload {
    staged: PathBuf,
    dest: PathBuf,
    name: String,
    committed: bool,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.staged
    }

    /// Final file name the upload is kept under once committed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Moves the staged bytes to the final name, replacing any earlier upload with it.
    pub fn commit(mut self) -> Result<PathBuf, AppError> {
        fs::rename(&self.staged, &self.dest).map_err(|e| {
            AppError::new("UPLOAD_STORE_FAILED", "Failed to save uploaded file").with_details(format!(
                "tmp={}; dest={}; err={}",
                self.staged.display(),
                self.dest.display(),
                e
            ))
        })?;
        self.committed = true;
        tracing::info!("saved upload {}", self.dest.display());
        Ok(self.dest.clone())
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.staged);
        }
    }
}
