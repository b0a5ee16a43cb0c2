//! Configuration for the packet engine
//!
//! Centralized configuration with sensible defaults. Can be built in code
//! or loaded from a TOML file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Main configuration for an engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// Host running the packet engine server
    pub host: String,

    /// TCP port of the packet engine server
    pub port: u16,

    /// Credentials sent with the login frame before the handshake.
    /// Servers that do not authenticate ignore it.
    pub login: Option<Credentials>,

    // -------------------------------------------------------------------------
    // Transport Configuration
    // -------------------------------------------------------------------------
    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm on the server connection
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Largest payload accepted from the server. A header declaring more
    /// than this is treated as a framing error.
    pub max_payload_size: usize,

    /// How long convenience wrappers wait for readiness (milliseconds)
    pub ready_timeout_ms: u64,
}

/// User id and password for the login frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            login: None,
            connect_timeout_ms: 5000,
            write_timeout_ms: 5000,
            nodelay: true,
            max_payload_size: 64 * 1024, // 64 KB
            ready_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check invariants that the type system does not
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(EngineError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(EngineError::Config("port must not be 0".to_string()));
        }
        if self.max_payload_size == 0 {
            return Err(EngineError::Config(
                "max_payload_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Send a login frame with these credentials when connecting
    pub fn login(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.login = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the largest accepted payload (in bytes)
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Set the readiness wait used by convenience wrappers (in milliseconds)
    pub fn ready_timeout_ms(mut self, ms: u64) -> Self {
        self.config.ready_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
