//! Server configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Runtime configuration for the game server.
///
/// Every field has a default, so an empty TOML file is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    #[setters(into)]
    bind: String,

    /// Whether the owner may start before every seat is taken.
    can_start_before_full: bool,

    /// Bound of the server's inbound dispatch queue.
    dispatch_capacity: usize,

    /// Bound of each game session's task queue.
    session_queue_capacity: usize,

    /// Bound of each client's outbound send queue.
    client_send_capacity: usize,

    /// Deadline for rule evaluation and slow-task reporting, in milliseconds.
    task_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            can_start_before_full: false,
            dispatch_capacity: 256,
            session_queue_capacity: 64,
            client_send_capacity: 64,
            task_timeout_ms: 2000,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(bind = %config.bind, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text and validates it.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the runtime cannot honour.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let queues = [
            ("dispatch_capacity", self.dispatch_capacity),
            ("session_queue_capacity", self.session_queue_capacity),
            ("client_send_capacity", self.client_send_capacity),
        ];
        for (name, value) in queues {
            if value == 0 {
                return Err(ConfigError::new(format!("{} must be at least 1", name)));
            }
        }
        if self.task_timeout_ms == 0 {
            return Err(ConfigError::new("task_timeout_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Deadline as a [`Duration`].
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
