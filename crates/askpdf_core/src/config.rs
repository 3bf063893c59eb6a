//! Runtime configuration.
//!
//! Settings are merged with Figment from an optional `askpdf.toml` and the raw
//! process environment, so the same variable names work in either place
//! (lowercased in the TOML file). Validation happens once at startup; a missing
//! credential fails here rather than on the first network call.

use std::fmt;
use std::path::PathBuf;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::chunking::{ChunkingPolicy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, MAX_EMBED_INPUT_CHARS};
use crate::error::AppError;

pub const CONFIG_FILE: &str = "askpdf.toml";

const REQUIRED_KEYS: [&str; 6] = [
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_ENDPOINT",
    "EMBEDDING_DEPLOYMENT_NAME",
    "EMBEDDING_MODEL_NAME",
    "DEPLOYMENT_NAME",
    "API_VERSION",
];

const OPTIONAL_KEYS: [&str; 7] = [
    "EMBEDDING_DIMENSIONS",
    "ASKPDF_INDEX_DIR",
    "ASKPDF_UPLOAD_DIR",
    "ASKPDF_BIND_ADDR",
    "ASKPDF_CHUNK_SIZE",
    "ASKPDF_CHUNK_OVERLAP",
    "ASKPDF_TOP_K",
];

#[derive(Debug, Clone, Deserialize, Default)]
struct RawSettings {
    azure_openai_api_key: Option<String>,
    azure_openai_endpoint: Option<String>,
    embedding_deployment_name: Option<String>,
    embedding_model_name: Option<String>,
    deployment_name: Option<String>,
    api_version: Option<String>,
    embedding_dimensions: Option<usize>,
    askpdf_index_dir: Option<PathBuf>,
    askpdf_upload_dir: Option<PathBuf>,
    askpdf_bind_addr: Option<String>,
    askpdf_chunk_size: Option<usize>,
    askpdf_chunk_overlap: Option<usize>,
    askpdf_top_k: Option<usize>,
}

#[derive(Clone)]
pub struct AzureSettings {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

impl fmt::Debug for AzureSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub deployment: String,
    pub model: String,
    pub dimensions: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub deployment: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub azure: AzureSettings,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
    pub chunking: ChunkingPolicy,
    pub top_k: usize,
    pub index_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub bind_addr: String,
}

impl Settings {
    pub fn load() -> Result<Self, AppError> {
        Self::from_figment(&Self::figment())
    }

    pub fn figment() -> Figment {
        let keys: Vec<&str> = REQUIRED_KEYS.iter().chain(OPTIONAL_KEYS.iter()).copied().collect();
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(&keys))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, AppError> {
        let raw: RawSettings = figment.extract().map_err(|e| {
            AppError::new("CONFIG_INVALID", "Failed to read configuration").with_details(e.to_string())
        })?;

        let mut missing: Vec<&str> = Vec::new();
        let api_key = required(&raw.azure_openai_api_key, REQUIRED_KEYS[0], &mut missing);
        let endpoint = required(&raw.azure_openai_endpoint, REQUIRED_KEYS[1], &mut missing);
        let embedding_deployment = required(&raw.embedding_deployment_name, REQUIRED_KEYS[2], &mut missing);
        let embedding_model = required(&raw.embedding_model_name, REQUIRED_KEYS[3], &mut missing);
        let chat_deployment = required(&raw.deployment_name, REQUIRED_KEYS[4], &mut missing);
        let api_version = required(&raw.api_version, REQUIRED_KEYS[5], &mut missing);
        if !missing.is_empty() {
            return Err(AppError::new(
                "CONFIG_MISSING",
                "Required configuration is missing",
            )
            .with_details(format!("missing={}", missing.join(","))));
        }

        let endpoint = endpoint.trim_end_matches('/').to_string();
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "AZURE_OPENAI_ENDPOINT must be an http(s) URL",
            )
            .with_details(format!("endpoint={endpoint}")));
        }

        if raw.embedding_dimensions == Some(0) {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "EMBEDDING_DIMENSIONS must be greater than zero when set",
            ));
        }

        let chunk_size = raw.askpdf_chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size > MAX_EMBED_INPUT_CHARS {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "ASKPDF_CHUNK_SIZE exceeds the embedding input limit",
            )
            .with_details(format!("chunk_size={chunk_size}; max={MAX_EMBED_INPUT_CHARS}")));
        }
        let chunking = ChunkingPolicy::new(
            chunk_size,
            raw.askpdf_chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
        )?;

        let top_k = raw.askpdf_top_k.unwrap_or(4);
        if top_k == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "ASKPDF_TOP_K must be greater than zero",
            ));
        }

        Ok(Self {
            azure: AzureSettings {
                endpoint,
                api_key,
                api_version,
            },
            embedding: EmbeddingSettings {
                deployment: embedding_deployment,
                model: embedding_model,
                dimensions: raw.embedding_dimensions,
            },
            chat: ChatSettings {
                deployment: chat_deployment,
            },
            chunking,
            top_k,
            index_dir: raw.askpdf_index_dir.unwrap_or_else(|| PathBuf::from("kb_index")),
            upload_dir: raw.askpdf_upload_dir.unwrap_or_else(|| PathBuf::from("uploads")),
            bind_addr: raw
                .askpdf_bind_addr
                .unwrap_or_else(|| "127.0.0.1:5000".to_string()),
        })
    }
}

fn required(value: &Option<String>, key: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(key);
            String::new()
        }
    }
}
