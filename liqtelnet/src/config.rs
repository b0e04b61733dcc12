//! Connector configuration
//!
//! Loading and merging configuration files belongs to the host application;
//! this struct is only the slice it must hand over, deserializable from the
//! usual YAML/TOML section:
//!
//! ```yaml
//! liquidsoap:
//!   method: live
//!   host: 192.168.1.10
//!   port: 1234
//! ```

use serde::Deserialize;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 1234;

/// Which connector flavor to build. Fixed once at process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorMethod {
    /// No engine configured: constant "not configured" snapshot.
    #[default]
    Disabled,
    /// Deterministic time-driven fake, for demos and tests.
    Simulated,
    /// Real telnet session to a running engine.
    Live,
}

/// Settings of the control link to one engine endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub method: ConnectorMethod,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Socket timeout override, in seconds. Bounds the worst-case blocking
    /// per attempt; a full command may take up to twice this (one failed
    /// attempt, reconnect, one retry).
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Explicit primary output name, overriding auto-detection.
    #[serde(default)]
    pub primary_output: Option<String>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            method: ConnectorMethod::Disabled,
            host: default_host(),
            port: default_port(),
            timeout: None,
            primary_output: None,
        }
    }
}
