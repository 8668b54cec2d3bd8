//! Client configuration.
//!
//! Settings live in a single `config.toml` file at
//! `~/.config/livechat/config.toml` by default. A missing file means
//! defaults; command-line flags override whatever the file says.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Default credential API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.live.bilibili.com";

/// Default WebSocket scheme.
pub const DEFAULT_SCHEME: &str = "wss";

// ---------------------------------------------------------------------------
// ClientSettings (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the livechat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL of the credential API.
    pub api_base: String,

    /// WebSocket scheme (`wss` or `ws`).
    pub scheme: String,

    /// Display settings.
    pub display: DisplaySettings,

    /// Static credentials, bypassing the credential API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialSettings>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            display: DisplaySettings::default(),
            credentials: None,
        }
    }
}

/// Display settings for output formatting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Prefix lines with the message time.
    pub show_time: bool,

    /// Print JSON lines instead of terminal lines.
    pub json: bool,
}

/// Static token and host list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Verify token.
    pub token: String,

    /// Hosts as `host:port`, tried in order.
    pub hosts: Vec<String>,
}

impl CredentialSettings {
    /// Parses the host list.
    pub fn host_list(&self) -> ClientResult<Vec<HostAddr>> {
        self.hosts.iter().map(|h| h.parse()).collect()
    }
}

impl ClientSettings {
    /// Loads configuration from the default path.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("livechat")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Connection parameters
// ---------------------------------------------------------------------------

/// One candidate broadcast host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddr {
    /// Hostname.
    pub host: String,
    /// WebSocket port.
    pub port: u16,
}

impl HostAddr {
    /// Creates a host address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the WebSocket endpoint for this host.
    pub fn url(&self, scheme: &str) -> String {
        format!("{}://{}:{}/sub", scheme, self.host, self.port)
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for HostAddr {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ClientError::Config(format!("expected host:port, got {:?}", s)))?;
        if host.is_empty() {
            return Err(ClientError::Config(format!("missing host in {:?}", s)));
        }
        let port = port
            .parse()
            .map_err(|_| ClientError::Config(format!("invalid port in {:?}", s)))?;
        Ok(Self::new(host, port))
    }
}

/// Everything needed for one attempt sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Verify token.
    pub auth_token: String,
    /// Candidate hosts, in order.
    pub host_list: Vec<HostAddr>,
    /// Room to join.
    pub room_id: u64,
}
