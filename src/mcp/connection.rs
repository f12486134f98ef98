//! Per-server connection lifecycle management.
//!
//! One [`ServerConnection`] owns at most one live session to one tool
//! server. Connect/fetch/invoke/disconnect follow a strict state machine:
//!
//! ```text
//! Disconnected --connect ok--> Connected --disconnect--> Disconnected
//! Disconnected --connect err-> Disconnected (after cleanup)
//! Disconnected --disconnect--> Disconnected (no-op)
//! ```
//!
//! A second connect while Connected or Connecting is rejected, never
//! queued. Disconnect is idempotent and never propagates teardown errors.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ServerEntry;
use crate::mcp::{
    bounded, CallOptions, SessionConnector, SessionError, ToolDescriptor, ToolSession,
};

/// Error type for MCP client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid launch command for server '{server}': {command}")]
    InvalidLaunchSpec { server: String, command: String },

    #[error("Failed to connect to server '{server}': {source}")]
    ConnectionFailure {
        server: String,
        #[source]
        source: SessionError,
    },

    #[error("Server '{0}' is not connected")]
    NotConnected(String),

    #[error("Server '{0}' is already connected")]
    AlreadyConnected(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Tool '{tool}' not found on server '{server}'")]
    ToolNotFound { server: String, tool: String },

    #[error("Tool '{tool}' on server '{server}' failed: {source}")]
    ToolExecutionFailure {
        server: String,
        tool: String,
        #[source]
        source: SessionError,
    },

    #[error("Missing required argument '{argument}' for tool '{tool}'")]
    MissingArgument { tool: String, argument: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Lifecycle state of a [`ServerConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

struct Inner {
    state: ConnectionState,
    session: Option<Box<dyn ToolSession>>,
    tools: Vec<ToolDescriptor>,
}

/// A managed connection to one tool server.
///
/// The inner mutex serializes all session traffic for this connection; the
/// separate teardown mutex collapses concurrent disconnects into a single
/// effective teardown.
pub struct ServerConnection {
    name: String,
    entry: ServerEntry,
    connector: Arc<dyn SessionConnector>,
    inner: Mutex<Inner>,
    teardown: Mutex<()>,
}

impl ServerConnection {
    /// Create a disconnected connection for `name`.
    pub fn new(
        name: impl Into<String>,
        entry: ServerEntry,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        Self {
            name: name.into(),
            entry,
            connector,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                session: None,
                tools: Vec::new(),
            }),
            teardown: Mutex::new(()),
        }
    }

    /// Server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Launch entry this connection was configured with.
    pub fn entry(&self) -> &ServerEntry {
        &self.entry
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Whether the connection is currently usable.
    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// The tool set from the most recent successful fetch.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.inner.lock().await.tools.clone()
    }

    /// Launch the server process and run the session handshake.
    ///
    /// Rejected with [`ClientError::AlreadyConnected`] while a session is
    /// live or being established. On failure every partially-acquired
    /// resource is released before the error is returned.
    pub async fn connect(&self, opts: &CallOptions) -> Result<(), ClientError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != ConnectionState::Disconnected {
                return Err(ClientError::AlreadyConnected(self.name.clone()));
            }
            inner.state = ConnectionState::Connecting;
        }

        info!(server = %self.name, "connecting");
        let result = bounded(opts, self.connector.connect(&self.name, &self.entry)).await;

        let mut inner = self.inner.lock().await;
        match result {
            Ok(session) => {
                if inner.state != ConnectionState::Connecting {
                    // A disconnect raced the handshake and won; release the
                    // fresh session instead of storing it.
                    drop(inner);
                    if let Err(e) = session.close().await {
                        warn!(server = %self.name, error = %e, "error releasing raced session");
                    }
                    return Err(ClientError::NotConnected(self.name.clone()));
                }
                inner.state = ConnectionState::Connected;
                inner.session = Some(session);
                info!(server = %self.name, "connected");
                Ok(())
            }
            Err(e) => {
                inner.state = ConnectionState::Disconnected;
                inner.session = None;
                Err(e)
            }
        }
    }

    /// Fetch the tool listing, replacing the cached set wholesale.
    pub async fn fetch_tools(&self, opts: &CallOptions) -> Result<Vec<ToolDescriptor>, ClientError> {
        let mut inner = self.inner.lock().await;
        if inner.state != ConnectionState::Connected {
            return Err(ClientError::NotConnected(self.name.clone()));
        }

        let tools = match inner.session.as_ref() {
            Some(session) => {
                bounded(opts, async {
                    session
                        .list_tools()
                        .await
                        .map_err(|source| ClientError::ConnectionFailure {
                            server: self.name.clone(),
                            source,
                        })
                })
                .await?
            }
            None => return Err(ClientError::NotConnected(self.name.clone())),
        };

        inner.tools = tools.clone();
        Ok(tools)
    }

    /// Invoke a tool and return its raw result payload unmodified.
    ///
    /// A failed call does not change the connection state; the session is
    /// assumed live until disconnect.
    pub async fn invoke(
        &self,
        tool: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
        opts: &CallOptions,
    ) -> Result<serde_json::Value, ClientError> {
        let inner = self.inner.lock().await;
        if inner.state != ConnectionState::Connected {
            return Err(ClientError::NotConnected(self.name.clone()));
        }
        let session = inner
            .session
            .as_ref()
            .ok_or_else(|| ClientError::NotConnected(self.name.clone()))?;

        info!(server = %self.name, tool, "invoking tool");
        bounded(opts, async {
            session.call_tool(tool, arguments).await.map_err(|source| {
                ClientError::ToolExecutionFailure {
                    server: self.name.clone(),
                    tool: tool.to_string(),
                    source,
                }
            })
        })
        .await
    }

    /// Tear the session down.
    ///
    /// Idempotent: a disconnect while already Disconnected is a no-op.
    /// Teardown errors are logged and swallowed so this is always safe to
    /// call during cleanup; the state ends Disconnected regardless.
    pub async fn disconnect(&self) {
        let _guard = self.teardown.lock().await;

        let session = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                ConnectionState::Disconnected => return,
                ConnectionState::Connecting => {
                    // Nothing acquired yet; flagging Disconnected makes the
                    // in-flight connect discard its session on completion.
                    inner.state = ConnectionState::Disconnected;
                    return;
                }
                ConnectionState::Connected | ConnectionState::Disconnecting => {
                    inner.state = ConnectionState::Disconnecting;
                    inner.session.take()
                }
            }
        };

        if let Some(session) = session {
            if let Err(e) = session.close().await {
                warn!(server = %self.name, error = %e, "error closing session");
            }
        }

        let mut inner = self.inner.lock().await;
        inner.state = ConnectionState::Disconnected;
        info!(server = %self.name, "disconnected");
    }
}
