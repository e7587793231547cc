//! OpenAI-wire-format adapter for the model collaborator traits.
//!
//! One HTTP client serves all three roles: the cheap model classifies, the
//! expensive model generates and assesses, and the embeddings endpoint backs
//! knowledge retrieval. Timeouts and degradation live in the callers; this
//! adapter only translates errors into `LlmError`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::{Classifier, Embedder, PromptContext, Responder, classify_prompt, severity_prompt};
use crate::error::LlmError;

/// Token cap for classification calls (runs on every uncached message).
const CLASSIFY_MAX_TOKENS: u32 = 10;

/// Token cap for generation/assessment calls.
const GENERATE_MAX_TOKENS: u32 = 500;

const CLASSIFY_TEMPERATURE: f32 = 0.1;
const GENERATE_TEMPERATURE: f32 = 0.3;

/// Configuration for [`HttpLlm`].
#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    /// Base URL of an OpenAI-compatible API (e.g. `https://api.example.com/v1`).
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used for classification.
    pub cheap_model: String,
    /// Model used for generation and severity assessment.
    pub expensive_model: String,
    pub embedding_model: String,
}

/// HTTP-backed implementation of all three model traits.
pub struct HttpLlm {
    client: reqwest::Client,
    config: HttpLlmConfig,
}

impl HttpLlm {
    pub fn new(config: HttpLlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn chat(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let payload = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: model.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LlmError::RequestFailed {
                provider: model.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body: serde_json::Value =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: model.to_string(),
                reason: e.to_string(),
            })?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: model.to_string(),
                reason: "missing choices[0].message.content".to_string(),
            })?;

        debug!(model, chars = content.len(), "Chat completion received");
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl Classifier for HttpLlm {
    async fn classify(&self, text: &str) -> Result<String, LlmError> {
        self.chat(
            &self.config.cheap_model,
            &classify_prompt(text),
            CLASSIFY_MAX_TOKENS,
            CLASSIFY_TEMPERATURE,
        )
        .await
    }
}

#[async_trait]
impl Responder for HttpLlm {
    async fn generate(&self, context: &PromptContext) -> Result<String, LlmError> {
        self.chat(
            &self.config.expensive_model,
            &context.render(),
            GENERATE_MAX_TOKENS,
            GENERATE_TEMPERATURE,
        )
        .await
    }

    async fn assess(&self, text: &str) -> Result<String, LlmError> {
        self.chat(
            &self.config.expensive_model,
            &severity_prompt(text),
            GENERATE_MAX_TOKENS,
            CLASSIFY_TEMPERATURE,
        )
        .await
    }
}

#[async_trait]
impl Embedder for HttpLlm {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let payload = serde_json::json!({
            "model": self.config.embedding_model,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.config.embedding_model.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LlmError::RequestFailed {
                provider: self.config.embedding_model.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body: serde_json::Value =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: self.config.embedding_model.clone(),
                reason: e.to_string(),
            })?;

        let embedding = body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: self.config.embedding_model.clone(),
                reason: "missing data[0].embedding".to_string(),
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        Ok(embedding)
    }
}
