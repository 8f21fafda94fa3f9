// src/llm/openai.rs
// OpenAI-compatible provider over plain HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatMessage, ModelCaps, ModelProvider, ModelRegistry, ResponseShape};
use crate::config::AgentConfig;
use crate::error::AgentError;

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    caps: ModelCaps,
}

impl OpenAiClient {
    pub fn new(config: &AgentConfig, registry: &ModelRegistry) -> Result<Self, AgentError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let caps = registry.resolve(&config.model);
        debug!(
            "model {} resolved: fixed_temperature={:?}, shape={:?}",
            config.model, caps.fixed_temperature, caps.response_shape
        );

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            caps,
        })
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value, AgentError> {
        let url = format!("{}/v1/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::Transport(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))
    }

    fn wire_messages(history: &[ChatMessage]) -> Vec<Value> {
        history
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect()
    }

    async fn chat_completion(&self, history: &[ChatMessage], temperature: f64) -> Result<String, AgentError> {
        let body = json!({
            "model": self.model,
            "messages": Self::wire_messages(history),
            "temperature": temperature,
        });

        let raw = self.post("chat/completions", body).await?;
        raw["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::MalformedResponse("no message content in reply".into()))
    }

    async fn responses_call(&self, history: &[ChatMessage], temperature: f64) -> Result<String, AgentError> {
        let body = json!({
            "model": self.model,
            "input": Self::wire_messages(history),
            "temperature": temperature,
        });

        let raw = self.post("responses", body).await?;
        if let Some(text) = raw["output_text"].as_str() {
            return Ok(text.to_string());
        }
        // Some gateways only populate the structured output list.
        extract_output_text(&raw)
            .ok_or_else(|| AgentError::MalformedResponse("no output text in reply".into()))
    }
}

// output[] -> content[] -> text, concatenated across message items.
fn extract_output_text(raw: &Value) -> Option<String> {
    let items = raw["output"].as_array()?;
    let mut text = String::new();
    for item in items {
        if let Some(parts) = item["content"].as_array() {
            for part in parts {
                if let Some(piece) = part["text"].as_str() {
                    text.push_str(piece);
                }
            }
        }
    }
    if text.is_empty() { None } else { Some(text) }
}

#[async_trait]
impl ModelProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn send_turn(
        &self,
        history: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, AgentError> {
        let temperature = self.caps.fixed_temperature.unwrap_or(temperature);
        debug!(
            "send_turn: model={}, turns={}, temperature={}",
            self.model,
            history.len(),
            temperature
        );

        match self.caps.response_shape {
            ResponseShape::Chat => self.chat_completion(history, temperature).await,
            ResponseShape::Responses => self.responses_call(history, temperature).await,
        }
    }
}
