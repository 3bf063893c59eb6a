use std::time::Duration;

use askpdf_core::chunking::MAX_EMBED_INPUT_CHARS;
use askpdf_core::config::EmbeddingSettings;
use askpdf_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::azure::AzureOpenAiClient;

#[derive(Debug, Clone)]
pub struct AzureEmbedder {
    client: AzureOpenAiClient,
    deployment: String,
    model: String,
    dimensions: Option<usize>,
}

impl AzureEmbedder {
    pub fn new(client: AzureOpenAiClient, settings: &EmbeddingSettings) -> Self {
        Self {
            client,
            deployment: settings.deployment.clone(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl Embedder for AzureEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dimensions
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let chars = input.chars().count();
        if chars > MAX_EMBED_INPUT_CHARS {
            return Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Embedding input is longer than the gateway accepts",
            )
            .with_details(format!("chars={chars}; max={MAX_EMBED_INPUT_CHARS}")));
        }

        let url = self.client.deployment_url(&self.deployment, "embeddings");
        let req = EmbeddingsRequest {
            input,
            dimensions: self.dimensions,
        };
        let resp = self
            .client
            .post_json(&url, &req, Duration::from_secs(30))
            .map_err(|e| e.into_app_error("AI_EMBEDDINGS_FAILED", "Embeddings"))?;

        let v: EmbeddingsResponse = resp.into_json().map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to decode embeddings response")
                .with_details(e.to_string())
        })?;
        let embedding = v
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .unwrap_or_default();
        if embedding.is_empty() {
            return Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Embeddings response was empty",
            ));
        }
        if let Some(expected) = self.dimensions {
            if embedding.len() != expected {
                return Err(AppError::new(
                    "AI_EMBEDDINGS_FAILED",
                    "Embeddings response has unexpected dimensions",
                )
                .with_details(format!("expected={expected}; got={}", embedding.len())));
            }
        }
        Ok(embedding)
    }
}
