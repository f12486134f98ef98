//! OpenAI-compatible chat-completions client.
//!
//! Works against any endpoint speaking the `/chat/completions` shape
//! (OpenAI, Groq, OpenRouter, local runtimes). Settings come from the
//! environment so the launch-config file stays exactly the shared
//! `mcpServers` shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, ModelClient, ModelError};
use crate::mcp::CallOptions;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection settings for the model endpoint.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Base URL up to (not including) `/chat/completions`.
    pub base_url: String,
    /// Bearer token; empty means no Authorization header.
    pub api_key: String,
    /// Model identifier sent with each request.
    pub model: String,
}

impl ModelSettings {
    /// Read settings from `LADLE_MODEL_URL`, `LADLE_MODEL_KEY`, and
    /// `LADLE_MODEL`, with OpenAI defaults for URL and model.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("LADLE_MODEL_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: std::env::var("LADLE_MODEL_KEY").unwrap_or_default(),
            model: std::env::var("LADLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible endpoint.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    settings: ModelSettings,
}

impl OpenAiCompatClient {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Client configured from the environment.
    pub fn from_env() -> Self {
        Self::new(ModelSettings::from_env())
    }

    async fn request(&self, history: &[ChatMessage]) -> Result<String, ModelError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        debug!(model = %self.settings.model, messages = history.len(), "calling model");

        let mut request = self.http.post(&url).json(&CompletionRequest {
            model: &self.settings.model,
            messages: history,
        });
        if !self.settings.api_key.is_empty() {
            request = request.bearer_auth(&self.settings.api_key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: CompletionResponse = response.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Malformed("response carried no message content".into()))
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn complete(
        &self,
        history: &[ChatMessage],
        opts: &CallOptions,
    ) -> Result<String, ModelError> {
        let call = async {
            match opts.timeout {
                Some(limit) => tokio::time::timeout(limit, self.request(history))
                    .await
                    .map_err(|_| ModelError::Timeout(limit))?,
                None => self.request(history).await,
            }
        };

        match &opts.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(ModelError::Cancelled),
                result = call => result,
            },
            None => call.await,
        }
    }
}
