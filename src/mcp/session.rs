//! The opaque session capability and its rmcp-backed implementation.
//!
//! [`ServerConnection`](super::ServerConnection) talks to a server through
//! the [`ToolSession`] trait and acquires sessions through a
//! [`SessionConnector`], so tests can swap in scripted sessions without a
//! child process. The production path is [`StdioConnector`]: resolve the
//! launch command, spawn the child over stdio via `rmcp`, and run the
//! initialize handshake.

use async_trait::async_trait;
use rmcp::{
    model::CallToolRequestParam,
    service::{RoleClient, RunningService},
    transport::{ConfigureCommandExt, TokioChildProcess},
    ServiceExt,
};
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::ServerEntry;
use crate::mcp::{ClientError, ToolDescriptor};

/// Transport-level failure inside a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn server process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("initialize handshake failed: {0}")]
    Handshake(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("close failed: {0}")]
    Close(String),
}

/// The live, stateful channel to one connected server.
///
/// A session is exclusively owned by its [`ServerConnection`] and is given
/// up on [`close`](ToolSession::close); tool results pass through as raw
/// JSON.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// List the tools the server exposes.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError>;

    /// Call a tool with already-shaped arguments, returning the raw
    /// result payload.
    async fn call_tool(
        &self,
        tool: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<Value, SessionError>;

    /// Tear the session down, releasing the child process.
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// Acquires sessions for a connection.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Launch and initialize a session for `server` per its entry.
    ///
    /// Implementations must release any partially-acquired resources
    /// before returning an error.
    async fn connect(
        &self,
        server: &str,
        entry: &ServerEntry,
    ) -> Result<Box<dyn ToolSession>, ClientError>;
}

/// Stdio child-process connector backed by the rmcp SDK.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioConnector;

#[async_trait]
impl SessionConnector for StdioConnector {
    async fn connect(
        &self,
        server: &str,
        entry: &ServerEntry,
    ) -> Result<Box<dyn ToolSession>, ClientError> {
        // Logical aliases like `npx`, `uvx`, or `python` resolve to the
        // installed executable; an unresolvable command never spawns.
        let command = which::which(&entry.command).map_err(|_| ClientError::InvalidLaunchSpec {
            server: server.to_string(),
            command: entry.command.clone(),
        })?;

        debug!(server, command = %command.display(), "spawning tool server");

        let cmd = Command::new(&command).configure(|cmd| {
            for arg in &entry.args {
                cmd.arg(arg);
            }
            // Per-server overrides merge over the inherited environment.
            for (key, value) in &entry.env {
                cmd.env(key, value);
            }
        });

        let wrap = |source: SessionError| ClientError::ConnectionFailure {
            server: server.to_string(),
            source,
        };

        let transport = TokioChildProcess::new(cmd).map_err(|e| wrap(SessionError::Spawn(e)))?;

        // serve() runs the initialize handshake; on failure the transport
        // (and with it the child) is dropped and reaped.
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| wrap(SessionError::Handshake(e.to_string())))?;

        Ok(Box::new(StdioSession { service }))
    }
}

/// A running rmcp client session over a child process.
struct StdioSession {
    service: RunningService<RoleClient, ()>,
}

#[async_trait]
impl ToolSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;

        Ok(tools
            .into_iter()
            .map(|tool| {
                let schema = Value::Object((*tool.input_schema).clone());
                ToolDescriptor::from_listing(
                    tool.name.to_string(),
                    tool.description.map(|d| d.to_string()).unwrap_or_default(),
                    schema,
                )
            })
            .collect())
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<Value, SessionError> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;

        let value = serde_json::to_value(&result).map_err(|e| SessionError::Request(e.to_string()))?;

        // Protocol-level tool failures come back as a result flagged
        // isError rather than a transport error.
        if value.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            let message = value
                .get("content")
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .and_then(|item| item.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("tool reported an error");
            return Err(SessionError::Request(message.to_string()));
        }

        Ok(value)
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.service
            .cancel()
            .await
            .map(|_| ())
            .map_err(|e| SessionError::Close(e.to_string()))
    }
}
