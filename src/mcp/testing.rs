//! Scripted sessions and connectors for lifecycle and dispatch tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ServerEntry;
use crate::mcp::{ClientError, SessionConnector, SessionError, ToolDescriptor, ToolSession};

/// A scripted in-memory tool server session.
///
/// Shared via `Arc` so tests can observe call/close counters after the
/// connection has consumed the session.
pub struct MockSession {
    tools: Mutex<Vec<ToolDescriptor>>,
    calls: AtomicUsize,
    closes: AtomicUsize,
    next_call_error: Mutex<Option<String>>,
    close_error: Mutex<Option<String>>,
}

impl MockSession {
    pub fn new(tools: Vec<ToolDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            tools: Mutex::new(tools),
            calls: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            next_call_error: Mutex::new(None),
            close_error: Mutex::new(None),
        })
    }

    /// A session exposing a numeric `add(a, b)` tool.
    pub fn with_add_tool() -> Arc<Self> {
        Self::new(vec![ToolDescriptor::from_listing(
            "add".to_string(),
            "Add two numbers".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number", "description": "First operand"},
                    "b": {"type": "number", "description": "Second operand"}
                },
                "required": ["a", "b"]
            }),
        )])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_next_call(&self, message: &str) {
        *self.next_call_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_close(&self, message: &str) {
        *self.close_error.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl ToolSession for Arc<MockSession> {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        Ok(self.tools.lock().unwrap().clone())
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<Value, SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.next_call_error.lock().unwrap().take() {
            return Err(SessionError::Request(message));
        }

        match tool {
            "add" => {
                let a = arguments.get("a").and_then(Value::as_f64).unwrap_or(0.0);
                let b = arguments.get("b").and_then(Value::as_f64).unwrap_or(0.0);
                Ok(json!(a + b))
            }
            other => Err(SessionError::Request(format!("unknown tool: {other}"))),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.close_error.lock().unwrap().take() {
            return Err(SessionError::Close(message));
        }
        Ok(())
    }
}

/// Connector that hands out clones of one shared [`MockSession`],
/// optionally after a delay.
pub struct MockConnector {
    session: Arc<MockSession>,
    delay: Option<Duration>,
}

impl MockConnector {
    pub fn new(session: Arc<MockSession>) -> Self {
        Self {
            session,
            delay: None,
        }
    }

    pub fn slow(session: Arc<MockSession>, delay: Duration) -> Self {
        Self {
            session,
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(
        &self,
        _server: &str,
        _entry: &ServerEntry,
    ) -> Result<Box<dyn ToolSession>, ClientError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Box::new(Arc::clone(&self.session)))
    }
}

/// Connector that always fails the handshake.
pub struct FailingConnector;

#[async_trait]
impl SessionConnector for FailingConnector {
    async fn connect(
        &self,
        server: &str,
        _entry: &ServerEntry,
    ) -> Result<Box<dyn ToolSession>, ClientError> {
        Err(ClientError::ConnectionFailure {
            server: server.to_string(),
            source: SessionError::Handshake("mock handshake refused".to_string()),
        })
    }
}

/// Connector that mimics the production command-resolution check:
/// entries whose command is `missing-binary` fail with
/// [`ClientError::InvalidLaunchSpec`], everything else connects to a
/// fresh add-tool session.
pub struct ResolvingConnector {
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl ResolvingConnector {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionConnector for ResolvingConnector {
    async fn connect(
        &self,
        server: &str,
        entry: &ServerEntry,
    ) -> Result<Box<dyn ToolSession>, ClientError> {
        if entry.command == "missing-binary" {
            return Err(ClientError::InvalidLaunchSpec {
                server: server.to_string(),
                command: entry.command.clone(),
            });
        }
        let session = MockSession::with_add_tool();
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(Box::new(session))
    }
}
