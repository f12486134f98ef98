//! Multi-server registry: bulk setup/teardown and catalog aggregation.

use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::mcp::{
    CallOptions, ClientError, ServerConnection, SessionConnector, StdioConnector, ToolDescriptor,
};

/// Outcome of [`ServerRegistry::setup_all`].
///
/// Partial success is a valid end state: servers that failed stay
/// Disconnected while their siblings remain fully usable.
#[derive(Debug, Default)]
pub struct SetupReport {
    /// Servers that connected and listed their tools, registry order.
    pub ready: Vec<String>,
    /// Servers that failed, with the first error hit, registry order.
    pub failed: Vec<(String, ClientError)>,
}

impl SetupReport {
    /// True when every configured server came up.
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The in-process collection of all configured server connections.
///
/// Connections are created once from configuration; the collection is
/// never resized afterwards. Insertion order follows the config file and
/// fixes display and aggregation order.
pub struct ServerRegistry {
    servers: Vec<Arc<ServerConnection>>,
}

impl ServerRegistry {
    /// Build a registry for the enabled servers in `config`, acquiring
    /// sessions through `connector`.
    pub fn from_config(config: &Config, connector: Arc<dyn SessionConnector>) -> Self {
        let servers = config
            .enabled_servers()
            .map(|(name, entry)| {
                Arc::new(ServerConnection::new(
                    name.clone(),
                    entry.clone(),
                    Arc::clone(&connector),
                ))
            })
            .collect();
        Self { servers }
    }

    /// Build a registry backed by stdio child processes.
    pub fn stdio(config: &Config) -> Self {
        Self::from_config(config, Arc::new(StdioConnector))
    }

    /// Number of managed connections.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// True when no servers are configured.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Iterate over the connections in registry order.
    pub fn connections(&self) -> impl Iterator<Item = &Arc<ServerConnection>> {
        self.servers.iter()
    }

    /// Look up a connection by server name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<ServerConnection>> {
        self.servers.iter().find(|c| c.name() == name)
    }

    /// Connect every server and populate its tool set.
    ///
    /// Servers are brought up concurrently; a failure on one is recorded
    /// and does not abort the others. No retries are performed.
    pub async fn setup_all(&self, opts: &CallOptions) -> SetupReport {
        let attempts = self.servers.iter().map(|conn| async move {
            let result = async {
                conn.connect(opts).await?;
                conn.fetch_tools(opts).await?;
                Ok::<_, ClientError>(())
            }
            .await;

            if let Err(e) = &result {
                error!(server = %conn.name(), error = %e, "failed to set up server");
                // A half-open connection (connected but listing failed) is
                // torn back down so the state stays Disconnected.
                conn.disconnect().await;
            }
            (conn.name().to_string(), result)
        });

        let mut report = SetupReport::default();
        for (name, result) in futures::future::join_all(attempts).await {
            match result {
                Ok(()) => report.ready.push(name),
                Err(e) => report.failed.push((name, e)),
            }
        }

        info!(
            ready = report.ready.len(),
            failed = report.failed.len(),
            "registry setup finished"
        );
        report
    }

    /// Disconnect every server concurrently.
    ///
    /// Individual teardown failures are isolated inside
    /// [`ServerConnection::disconnect`]; this completes only once all
    /// disconnects have settled.
    pub async fn teardown_all(&self) {
        futures::future::join_all(self.servers.iter().map(|conn| conn.disconnect())).await;
        info!("registry teardown finished");
    }

    /// The aggregated tool catalog: `(server name, descriptor)` in
    /// registry order, then per-server tool order. Servers with no tools
    /// contribute nothing.
    pub async fn list_tools(&self) -> Vec<(String, ToolDescriptor)> {
        let mut catalog = Vec::new();
        for conn in &self.servers {
            for tool in conn.tools().await {
                catalog.push((conn.name().to_string(), tool));
            }
        }
        catalog
    }

    /// All `(server name, descriptor)` pairs matching a tool name.
    ///
    /// An empty result means "not found"; that is an expected outcome
    /// during interactive use, not an error.
    pub async fn find_tool(&self, tool_name: &str) -> Vec<(String, ToolDescriptor)> {
        let mut matches = Vec::new();
        for conn in &self.servers {
            for tool in conn.tools().await {
                if tool.name == tool_name {
                    matches.push((conn.name().to_string(), tool));
                }
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerEntry;
    use crate::mcp::testing::{MockConnector, MockSession, ResolvingConnector};
    use crate::mcp::ConnectionState;

    fn two_server_config() -> Config {
        let mut config = Config::new();
        config.add_server("broken", ServerEntry::new("missing-binary"));
        config.add_server("calc", ServerEntry::new("python"));
        config
    }

    #[tokio::test]
    async fn test_setup_partial_failure_isolation() {
        let config = two_server_config();
        let registry = ServerRegistry::from_config(&config, Arc::new(ResolvingConnector::new()));

        let report = registry.setup_all(&CallOptions::none()).await;

        assert_eq!(report.ready, vec!["calc"]);
        assert!(!report.all_ready());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert!(matches!(
            report.failed[0].1,
            ClientError::InvalidLaunchSpec { .. }
        ));

        let broken = registry.lookup("broken").unwrap();
        assert_eq!(broken.state().await, ConnectionState::Disconnected);
        let calc = registry.lookup("calc").unwrap();
        assert!(calc.is_connected().await);

        // The catalog contains only the usable server's tools.
        let catalog = registry.list_tools().await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].0, "calc");
        assert_eq!(catalog[0].1.name, "add");
    }

    #[tokio::test]
    async fn test_catalog_follows_registry_order() {
        let mut config = Config::new();
        config.add_server("zeta", ServerEntry::new("python"));
        config.add_server("alpha", ServerEntry::new("python"));
        let registry = ServerRegistry::from_config(&config, Arc::new(ResolvingConnector::new()));
        let report = registry.setup_all(&CallOptions::none()).await;
        assert!(report.all_ready());

        let servers: Vec<_> = registry
            .list_tools()
            .await
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(servers, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_disabled_servers_excluded() {
        let mut config = Config::new();
        let mut off = ServerEntry::new("python");
        off.enabled = false;
        config.add_server("off", off);
        config.add_server("on", ServerEntry::new("python"));

        let registry = ServerRegistry::from_config(&config, Arc::new(ResolvingConnector::new()));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("off").is_none());
    }

    #[tokio::test]
    async fn test_teardown_all_survives_failing_close() {
        let mut config = Config::new();
        config.add_server("a", ServerEntry::new("python"));
        config.add_server("b", ServerEntry::new("python"));
        config.add_server("c", ServerEntry::new("python"));

        let connector = Arc::new(ResolvingConnector::new());
        let registry = ServerRegistry::from_config(&config, connector.clone());
        registry.setup_all(&CallOptions::none()).await;

        let sessions = connector.sessions();
        assert_eq!(sessions.len(), 3);
        sessions[1].fail_close("release blew up");

        registry.teardown_all().await;

        for conn in registry.connections() {
            assert_eq!(conn.state().await, ConnectionState::Disconnected);
        }
        for session in &sessions {
            assert_eq!(session.closes(), 1);
        }
    }

    #[tokio::test]
    async fn test_find_tool() {
        let mut config = Config::new();
        config.add_server("calc", ServerEntry::new("python"));
        let session = MockSession::with_add_tool();
        let registry =
            ServerRegistry::from_config(&config, Arc::new(MockConnector::new(session)));
        registry.setup_all(&CallOptions::none()).await;

        assert_eq!(registry.find_tool("add").await.len(), 1);
        assert!(registry.find_tool("subtract").await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_unknown_server() {
        let registry = ServerRegistry::from_config(&Config::new(), Arc::new(ResolvingConnector::new()));
        assert!(registry.lookup("ghost").is_none());
        assert!(registry.is_empty());
    }
}
