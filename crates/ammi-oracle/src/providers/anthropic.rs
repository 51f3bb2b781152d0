use async_trait::async_trait;
use ammi_common::{Error, Result};
use reqwest::Client;
use serde_json::json;
use std::env;

use super::{ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmResponse, MessagePart, Usage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: String,
    client: Client,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::Config("ANTHROPIC_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    fn create_request_body(&self, request: &LlmRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                let content = match &msg.content {
                    MessagePart::Text(text) => json!(text),
                    MessagePart::Parts(parts) => {
                        let blocks: Vec<serde_json::Value> = parts
                            .iter()
                            .map(|part| match part {
                                ContentBlock::Text { text } => json!({
                                    "type": "text",
                                    "text": text,
                                }),
                                ContentBlock::Image { media_type, data } => json!({
                                    "type": "image",
                                    "source": {
                                        "type": "base64",
                                        "media_type": media_type,
                                        "data": data,
                                    },
                                }),
                            })
                            .collect();
                        json!(blocks)
                    }
                };

                json!({
                    "role": match msg.role {
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    },
                    "content": content,
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = self.create_request_body(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Oracle(format!("network error: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Oracle(format!("anthropic API error: {error_text}")));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Oracle(format!("invalid response body: {e}")))?;

        let content = raw["content"]
            .as_array()
            .ok_or_else(|| Error::Oracle("missing content".to_string()))?
            .iter()
            .filter_map(|block| match block["type"].as_str() {
                Some("text") => Some(ContentBlock::Text {
                    text: block["text"].as_str().unwrap_or_default().to_string(),
                }),
                _ => None,
            })
            .collect();

        let usage = raw["usage"].as_object().map(|u| Usage {
            input_tokens: u["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: u["output_tokens"].as_u64().unwrap_or(0) as u32,
        });

        Ok(LlmResponse {
            content,
            model: raw["model"].as_str().unwrap_or_default().to_string(),
            usage,
            stop_reason: raw["stop_reason"].as_str().map(|s| s.to_string()),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let request = LlmRequest {
            model: "claude-3-haiku-20240307".to_string(),
            messages: vec![ChatMessage::text(ChatRole::User, "ping")],
            system: None,
            max_tokens: 1,
        };
        let body = self.create_request_body(&request);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}
