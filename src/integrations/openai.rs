//! OpenAI API client for chart image analysis.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::router::VisionApi;
use crate::{Error, Result};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// OpenAI client.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    /// Create client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.openai_api_key.clone(), config.request_timeout)
    }

    /// Create client with API key and a per-request timeout.
    pub fn new<S: Into<String>>(api_key: S, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument("OPENAI_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("chartwatch/0.1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: OPENAI_API_URL.to_string(),
        })
    }

    /// Plain text completion. Used for the credential connectivity check.
    pub async fn chat_completion(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![RequestMessage {
                role: "user".to_string(),
                content: MessageContent::Text(prompt.to_string()),
            }],
            max_tokens,
        };

        self.send(request).await
    }

    /// Vision completion: an instruction plus one base64-encoded JPEG image.
    pub async fn vision_completion(
        &self,
        model: &str,
        system: Option<&str>,
        instruction: &str,
        image_base64: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let mut messages = Vec::new();

        if let Some(system) = system {
            messages.push(RequestMessage {
                role: "system".to_string(),
                content: MessageContent::Text(system.to_string()),
            });
        }

        messages.push(RequestMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: instruction.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{}", image_base64),
                    },
                },
            ]),
        });

        let request = ChatRequest {
            model: model.to_string(),
            messages,
            max_tokens,
        };

        self.send(request).await
    }

    async fn send(&self, request: ChatRequest) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::OpenAi(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::OpenAi(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::OpenAi(format!("{}: {}", status, text)));
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::OpenAi(format!("invalid response: {}", e)))?;

        chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| Error::OpenAi("empty response".to_string()))
    }
}

#[async_trait]
impl VisionApi for OpenAIClient {
    async fn analyze_chart(
        &self,
        model: &str,
        system: Option<&str>,
        instruction: &str,
        image_base64: &str,
        max_tokens: u32,
    ) -> Result<String> {
        self.vision_completion(model, system, instruction, image_base64, max_tokens)
            .await
    }

    async fn connectivity_check(&self, model: &str) -> Result<String> {
        self.chat_completion("API connectivity test", model, 10).await
    }
}

// === Request structures ===

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<RequestMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

// === Response structures ===

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
