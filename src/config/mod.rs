//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ImpError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpConfig {
    /// Network and request settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Keep-alive settings
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl ImpConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ImpError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| ImpError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(servers) = std::env::var("IMP_SERVERS") {
            config.network.servers = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Ok(val) = std::env::var("IMP_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = val.parse() {
                config.network.connect_timeout_ms = val;
            }
        }
        if let Ok(val) = std::env::var("IMP_REQUEST_TIMEOUT_MS") {
            if let Ok(val) = val.parse() {
                config.network.request_timeout_ms = val;
            }
        }
        if let Ok(val) = std::env::var("IMP_MAX_RETRIES") {
            if let Ok(val) = val.parse() {
                config.network.max_retries = val;
            }
        }
        if let Ok(val) = std::env::var("IMP_HEARTBEAT_INTERVAL_MS") {
            if let Ok(val) = val.parse() {
                config.heartbeat.interval_ms = val;
            }
        }

        config
    }

    /// Merge with another config (other takes precedence over defaults)
    pub fn merge(self, other: Self) -> Self {
        let net_default = NetworkConfig::default();
        Self {
            network: NetworkConfig {
                servers: if other.network.servers.is_empty() {
                    self.network.servers
                } else {
                    other.network.servers
                },
                connect_timeout_ms: if other.network.connect_timeout_ms
                    != net_default.connect_timeout_ms
                {
                    other.network.connect_timeout_ms
                } else {
                    self.network.connect_timeout_ms
                },
                request_timeout_ms: if other.network.request_timeout_ms
                    != net_default.request_timeout_ms
                {
                    other.network.request_timeout_ms
                } else {
                    self.network.request_timeout_ms
                },
                max_retries: if other.network.max_retries != net_default.max_retries {
                    other.network.max_retries
                } else {
                    self.network.max_retries
                },
                event_buffer: if other.network.event_buffer != net_default.event_buffer {
                    other.network.event_buffer
                } else {
                    self.network.event_buffer
                },
            },
            heartbeat: other.heartbeat,
        }
    }
}

/// Network and request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server endpoints tried in order, e.g. `["chat.example.net:8080"]`
    pub servers: Vec<String>,

    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Per-attempt request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Send attempts per request (1 = no retry)
    pub max_retries: u32,

    /// Event broadcast channel capacity
    pub event_buffer: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
            max_retries: 3,
            event_buffer: 256,
        }
    }
}

impl NetworkConfig {
    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Keep-alive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Whether the engine sends periodic heartbeats
    pub enabled: bool,

    /// Interval between heartbeats in milliseconds
    pub interval_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
        }
    }
}

impl HeartbeatConfig {
    /// Interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
