use std::time::Duration;

use askpdf_core::config::ChatSettings;
use askpdf_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Llm;
use crate::azure::AzureOpenAiClient;

const TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct AzureChatLlm {
    client: AzureOpenAiClient,
    deployment: String,
}

impl AzureChatLlm {
    pub fn new(client: AzureOpenAiClient, settings: &ChatSettings) -> Self {
        Self {
            client,
            deployment: settings.deployment.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl Llm for AzureChatLlm {
    fn chat(&self, system: &str, user: &str) -> Result<String, AppError> {
        let url = self.client.deployment_url(&self.deployment, "chat/completions");
        let req = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            stream: false,
        };

        let resp = self
            .client
            .post_json(&url, &req, Duration::from_secs(60))
            .map_err(|e| e.into_app_error("AI_GENERATION_FAILED", "Chat completion"))?;

        let v: ChatResponse = resp.into_json().map_err(|e| {
            AppError::new("AI_GENERATION_FAILED", "Failed to decode chat completion response")
                .with_details(e.to_string())
        })?;
        let content = v
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AppError::new(
                "AI_GENERATION_FAILED",
                "Chat completion response was empty",
            ));
        }
        Ok(content)
    }
}
