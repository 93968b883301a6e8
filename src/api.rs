//! Language model access.
//!
//! - [`AskAsync`]: send one user message, get the model's text back
//! - [`AnthropicClient`]: [`AskAsync`] over the Anthropic Messages API
//!
//! A call is made once; failures are returned to the caller, which logs
//! them and skips the file.

use crate::config::ExtractorConfig;
use crate::errors::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Instant;
use tracing::{info, instrument, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Trait for async LLM interaction.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send `text` as the user message and return the model's answer.
    async fn ask(&self, text: &str) -> Result<Self::Response, ModelError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for `POST {api_base}/v1/messages` with a fixed system prompt.
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl AnthropicClient {
    /// Build a client from the extractor settings.
    ///
    /// A missing key is not an error here: every call then fails with
    /// [`ModelError::MissingApiKey`].
    pub fn new(config: &ExtractorConfig, api_key: Option<String>, system: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system: system.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }
}

impl AskAsync for AnthropicClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model, bytes = text.len()))]
    async fn ask(&self, text: &str) -> Result<Self::Response, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: &self.system,
            messages: [UserMessage {
                role: "user",
                content: text,
            }],
        };

        let t0 = Instant::now();
        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let dt = t0.elapsed();

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(elapsed_ms = dt.as_millis() as u64, status = status.as_u16(), "API call failed");
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&body).map_err(|e| ModelError::Decode(e.to_string()))?;
        let first = parsed.content.into_iter().next().ok_or(ModelError::NoContent)?;
        info!(elapsed_ms = dt.as_millis() as u64, "API call succeeded");
        Ok(block_text(first))
    }
}

/// Text of a content block; blocks without a `text` field are rendered as JSON.
fn block_text(block: Value) -> String {
    match block.get("text").and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => block.to_string(),
    }
}
