//! Configuration for the test server.
//!
//! Values come from defaults, an optional YAML file and finally the command
//! line, in that order of precedence.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8126;
pub const DEFAULT_READ_TIMEOUT_DELAY_SECS: u64 = 60;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Address to bind; loopback unless overridden
    pub host: IpAddr,
    pub port: u16,
    /// Console logging when no `RUST_LOG` is set
    pub log: bool,
    /// How long `GET /hack-http-server/read-timeout` holds its body open
    pub read_timeout_delay_secs: u64,
    /// How long shutdown waits for in-flight connections. Never shorter
    /// than the read-timeout delay plus one second.
    pub shutdown_grace_secs: u64,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            log: false,
            read_timeout_delay_secs: DEFAULT_READ_TIMEOUT_DELAY_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load a YAML config file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn read_timeout_delay(&self) -> Duration {
        Duration::from_secs(self.read_timeout_delay_secs)
    }

    /// Effective shutdown grace period.
    ///
    /// Stretched so that a read-timeout body already being sent is finished
    /// before the server stops.
    pub fn shutdown_grace(&self) -> Duration {
        let floor = self.read_timeout_delay_secs.saturating_add(1);
        Duration::from_secs(self.shutdown_grace_secs.max(floor))
    }
}

/// Realm and credentials of the secured area
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub realm: String,
    pub login: String,
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: "Digest Test".to_string(),
            login: "me".to_string(),
            password: "test".to_string(),
        }
    }
}

/// Parse a bool-ish command line flag (`1`, `true`, `yes`, `on`, ...)
pub fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean flag, got '{other}'")),
    }
}
