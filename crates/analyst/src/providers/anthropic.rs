use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::{Provider, ProviderResponse};
use super::configs::AnthropicProviderConfig;
use super::utils::{
    anthropic_response_to_message, anthropic_usage, messages_to_anthropic_spec,
    tools_to_anthropic_spec,
};
use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(e.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderResponse, ProviderError> {
        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages_to_anthropic_spec(messages),
        });

        if let Some(object) = payload.as_object_mut() {
            if !system.is_empty() {
                object.insert("system".to_string(), json!(system));
            }
            if !tools.is_empty() {
                object.insert("tools".to_string(), json!(tools_to_anthropic_spec(tools)?));
            }
            if let Some(temp) = self.config.temperature {
                object.insert("temperature".to_string(), json!(temp));
            }
        }

        debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending completion request"
        );
        let response = self.post(payload).await?;

        let (message, stop_reason) = anthropic_response_to_message(&response)?;
        let usage = anthropic_usage(&response);
        debug!(
            stop_reason = %stop_reason,
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "completion received"
        );

        Ok(ProviderResponse {
            message,
            stop_reason,
            usage,
        })
    }
}
