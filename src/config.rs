//! Layered configuration
//!
//! Sources merge in priority order: built-in defaults, then `config.toml` in
//! the working directory, then environment variables prefixed with `SVC_`
//! (with `__` separating nesting levels, e.g. `SVC_SERVICE__PORT=9000`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// HTTP service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name reported by the health endpoint
    #[serde(default = "default_name")]
    pub name: String,

    /// Main listener port; 0 requests an ephemeral port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Debug listener port; 0 requests an ephemeral port
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Request body size limit in megabytes
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Default tracing filter, overridable per request via `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CIDR ranges trusted to set forwarding headers
    #[serde(default = "default_trusted_proxies")]
    pub trusted_proxies: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            port: default_port(),
            debug_port: default_debug_port(),
            read_timeout_secs: default_read_timeout(),
            body_limit_mb: default_body_limit_mb(),
            log_level: default_log_level(),
            trusted_proxies: default_trusted_proxies(),
        }
    }
}

impl ServiceConfig {
    /// Request timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Whether the lifecycle manager opens a pool at startup
    #[serde(default)]
    pub enabled: bool,

    /// Backend driver; only `postgres` is supported, other values are
    /// rejected when the pool is opened
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connections kept open when idle
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Maximum connection lifetime in seconds
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            driver: default_driver(),
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            max_lifetime_secs: default_max_lifetime(),
        }
    }
}

fn default_name() -> String {
    "service".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_debug_port() -> u16 {
    7070
}

fn default_read_timeout() -> u64 {
    15
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_trusted_proxies() -> Vec<String> {
    vec![
        "127.0.0.1".to_string(),
        "10.0.0.0/8".to_string(),
        "192.168.0.0/16".to_string(),
    ]
}

fn default_driver() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    25
}

fn default_min_connections() -> u32 {
    25
}

fn default_max_lifetime() -> u64 {
    600
}

impl Config {
    /// Load configuration from defaults, `./config.toml`, and `SVC_`
    /// environment variables
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration with an explicit TOML file path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SVC_").split("__"))
            .extract()?;
        Ok(config)
    }
}
