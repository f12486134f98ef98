//! Server launch configuration.
//!
//! Loads the set of tool servers to manage from a JSON file. The file uses
//! the `mcpServers` key (the shape most MCP hosts share), with `servers`
//! accepted as an alias:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "calc": {
//!       "command": "python",
//!       "args": ["servers/calculator.py"]
//!     },
//!     "filesystem": {
//!       "command": "npx",
//!       "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"],
//!       "env": { "LOG_LEVEL": "${LOG_LEVEL}" }
//!     }
//!   }
//! }
//! ```
//!
//! A missing or malformed file is a startup-fatal error; configuration is
//! never reloaded mid-session.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// One server entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Command used to launch the server process.
    pub command: String,

    /// Arguments passed to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides merged over the parent process environment.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Whether this server participates in setup.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Optional human description, shown in listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ServerEntry {
    /// Create an entry with just a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            enabled: true,
            description: None,
        }
    }

    /// Add arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Expand `${VAR}` references in args and env values against the
    /// current process environment. Unset variables expand to "".
    pub fn expand_env_vars(&mut self) {
        for arg in &mut self.args {
            *arg = expand_env_var(arg);
        }

        let expanded: HashMap<String, String> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), expand_env_var(v)))
            .collect();
        self.env = expanded;
    }
}

/// Expand `${VAR_NAME}` patterns in a string.
fn expand_env_var(s: &str) -> String {
    let mut result = s.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        } else {
            break;
        }
    }

    result
}

/// Root configuration structure.
///
/// Server order in the file is preserved; it fixes the display order of
/// the registry and the aggregated tool catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Map of server name to launch entry, in file order.
    #[serde(rename = "mcpServers", alias = "servers", default)]
    pub servers: IndexMap<String, ServerEntry>,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path (`~/.ladle/servers.json`).
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_config_path();
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;

        for entry in config.servers.values_mut() {
            entry.expand_env_vars();
        }

        Ok(config)
    }

    /// Default configuration path.
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ladle")
            .join("servers.json")
    }

    /// Iterate over the enabled servers, in file order.
    pub fn enabled_servers(&self) -> impl Iterator<Item = (&String, &ServerEntry)> {
        self.servers.iter().filter(|(_, entry)| entry.enabled)
    }

    /// Add a server entry.
    pub fn add_server(&mut self, name: impl Into<String>, entry: ServerEntry) {
        self.servers.insert(name.into(), entry);
    }

    /// Check whether a server is configured.
    pub fn has_server(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    /// Get a server entry by name.
    pub fn get_server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.get(name)
    }
}
