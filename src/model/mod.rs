//! The language-model capability.
//!
//! The chat loop consumes a model as a black-box request/response
//! capability: ordered message history in, one text reply out. The
//! production implementation ([`OpenAiCompatClient`]) speaks the
//! OpenAI-compatible `/chat/completions` shape; tests script their own
//! [`ModelClient`].

mod openai;

pub use openai::{ModelSettings, OpenAiCompatClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::mcp::CallOptions;

/// Failure mode of the model capability.
///
/// The conversation loop folds these into the history instead of letting
/// them crash the session.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model call failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model returned an unusable response: {0}")]
    Malformed(String),

    #[error("Model settings incomplete: {0}")]
    Settings(String),

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model call cancelled")]
    Cancelled,
}

/// Role tag of one conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A synchronous request/response language model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the full history and return the model's single text reply.
    async fn complete(
        &self,
        history: &[ChatMessage],
        opts: &CallOptions,
    ) -> Result<String, ModelError>;
}
