//! MCP (Model Context Protocol) client core.
//!
//! This module provides:
//! - Launch-config-driven server connections ([`ServerConnection`]) with a
//!   strict lifecycle state machine and idempotent teardown
//! - A multi-server registry ([`ServerRegistry`]) with partial-failure
//!   tolerant setup and concurrent teardown
//! - Tool-call dispatch ([`ToolInvoker`] / [`InvocationRequest`])
//! - Normalized tool descriptors with typed parameter coercion
//!
//! The transport/session layer is consumed behind the [`ToolSession`]
//! capability trait; the stdio implementation rides on the `rmcp` SDK.

mod connection;
mod invoker;
mod registry;
mod schema;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ClientError, ConnectionState, ServerConnection};
pub use invoker::{InvocationRequest, ToolInvoker};
pub use registry::{ServerRegistry, SetupReport};
pub use schema::{CoercionError, ParamKind, ToolDescriptor, ToolParam};
pub use session::{SessionConnector, SessionError, StdioConnector, ToolSession};

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounds for a single suspending operation.
///
/// Every connect, tool-list fetch, tool invocation, and model call accepts
/// one of these. The default imposes no timeout and no cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Abort the operation after this duration.
    pub timeout: Option<Duration>,
    /// Abort the operation when this token fires.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    /// No timeout, no cancellation.
    pub fn none() -> Self {
        Self::default()
    }

    /// Set a timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Run `fut` under the timeout and cancellation bounds in `opts`.
pub(crate) async fn bounded<T>(
    opts: &CallOptions,
    fut: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    let timed = async {
        match opts.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => fut.await,
        }
    };

    match &opts.cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(ClientError::Cancelled),
            result = timed => result,
        },
        None => timed.await,
    }
}
