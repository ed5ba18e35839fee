//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Login and password required by HTTP basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Returns true if the supplied pair matches.
    pub fn matches(&self, login: &str, password: &str) -> bool {
        self.login == login && self.password == password
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in seconds for entries set without one; 0 for none
    pub default_ttl: i64,
    /// Number of local shards
    pub shards: usize,
    /// Oplog file; persistence is off when unset
    pub log_file: Option<PathBuf>,
    /// Oplog flush interval in milliseconds
    pub save_freq_ms: u64,
    /// Capacity of the persister's mutation queue
    pub queue_capacity: usize,
    /// Wrap the cache in the operation logger
    pub log_operations: bool,
    /// HTTP server port
    pub server_port: u16,
    /// Basic auth; the API is open when None
    pub credentials: Option<Credentials>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 0, no expiry)
    /// - `SHARDS` - Number of shards (default: 1)
    /// - `LOG_FILE` - Oplog path (default: unset, no persistence)
    /// - `SAVE_FREQ_MS` - Oplog flush interval in ms (default: 500)
    /// - `OPLOG_QUEUE` - Mutation queue capacity (default: 1024)
    /// - `LOG_OPERATIONS` - Log every cache call (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `AUTH_LOGIN` / `AUTH_PASSWORD` - Basic auth, enabled when both are non-empty
    ///
    /// Values that fail to parse fall back to their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let credentials = match (env::var("AUTH_LOGIN"), env::var("AUTH_PASSWORD")) {
            (Ok(login), Ok(password)) if !login.is_empty() && !password.is_empty() => {
                Some(Credentials::new(login, password))
            }
            _ => None,
        };

        Self {
            default_ttl: parsed_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            shards: parsed_var("SHARDS").unwrap_or(defaults.shards),
            log_file: env::var("LOG_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            save_freq_ms: parsed_var("SAVE_FREQ_MS").unwrap_or(defaults.save_freq_ms),
            queue_capacity: parsed_var("OPLOG_QUEUE").unwrap_or(defaults.queue_capacity),
            log_operations: env::var("LOG_OPERATIONS")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.log_operations),
            server_port: parsed_var("SERVER_PORT").unwrap_or(defaults.server_port),
            credentials,
        }
    }
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: 0,
            shards: 1,
            log_file: None,
            save_freq_ms: 500,
            queue_capacity: 1024,
            log_operations: false,
            server_port: 8080,
            credentials: None,
        }
    }
}
