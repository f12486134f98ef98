//! Tool-call dispatch across the registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::mcp::{CallOptions, ClientError, ServerRegistry};

/// A fully-addressed tool call: which server, which tool, which arguments.
///
/// Built either directly (interactive execution) or parsed out of model
/// output (see [`crate::chat::parse_reply`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub server: String,
    pub tool: String,
    pub arguments: serde_json::Map<String, Value>,
}

impl InvocationRequest {
    pub fn new(
        server: impl Into<String>,
        tool: impl Into<String>,
        arguments: serde_json::Map<String, Value>,
    ) -> Self {
        Self {
            server: server.into(),
            tool: tool.into(),
            arguments,
        }
    }
}

/// Routes invocation requests to the right connection.
///
/// Validation runs in order: server exists, server connected, tool exists,
/// required arguments present. A request that fails any step never reaches
/// the child process. Argument *types* are not checked here; coercion is
/// the caller's responsibility.
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<ServerRegistry>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this invoker dispatches into.
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Validate and dispatch one request, returning the raw result
    /// payload.
    pub async fn dispatch(
        &self,
        request: &InvocationRequest,
        opts: &CallOptions,
    ) -> Result<Value, ClientError> {
        let connection = self
            .registry
            .lookup(&request.server)
            .ok_or_else(|| ClientError::ServerNotFound(request.server.clone()))?;

        if !connection.is_connected().await {
            return Err(ClientError::NotConnected(request.server.clone()));
        }

        let tools = connection.tools().await;
        let descriptor = tools
            .iter()
            .find(|t| t.name == request.tool)
            .ok_or_else(|| ClientError::ToolNotFound {
                server: request.server.clone(),
                tool: request.tool.clone(),
            })?;

        for required in descriptor.required_params() {
            if !request.arguments.contains_key(required) {
                return Err(ClientError::MissingArgument {
                    tool: request.tool.clone(),
                    argument: required.to_string(),
                });
            }
        }

        debug!(server = %request.server, tool = %request.tool, "dispatching");
        connection
            .invoke(&request.tool, request.arguments.clone(), opts)
            .await
    }
}
