use askpdf_core::error::AppError;

/// Text-to-vector gateway.
///
/// `model` and `dims` form the fingerprint recorded in a persisted index; an index
/// is only loaded by an embedder that reports the same values.
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    /// Dimensionality this embedder is configured to produce, when known up front.
    fn dims(&self) -> Option<usize> {
        None
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod azure_embed;
