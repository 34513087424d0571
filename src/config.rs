//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheOptions;
use crate::registry::DisplacedConnectionPolicy;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of campuses held in the admin lookup cache
    pub admin_cache_max_entries: usize,
    /// Sliding expiry of admin lookup entries in milliseconds (0 disables)
    pub admin_cache_sliding_ms: u64,
    /// Absolute expiry of admin lookup entries in milliseconds (0 disables)
    pub admin_cache_absolute_ms: u64,
    /// Background sweep interval in milliseconds
    pub sweep_interval_ms: u64,
    /// Whether a reconnect evicts the displaced connection's reverse entry
    pub evict_displaced_connections: bool,
    /// JSON file with users and credentials, if any
    pub directory_file: Option<PathBuf>,
    /// Shared secret required by the emit API; unset disables it
    pub emit_api_key: Option<String>,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `ADMIN_CACHE_MAX_ENTRIES` - Cached campuses (default: 500)
    /// - `ADMIN_CACHE_SLIDING_MS` - Sliding expiry (default: 60000)
    /// - `ADMIN_CACHE_ABSOLUTE_MS` - Absolute expiry (default: 600000)
    /// - `SWEEP_INTERVAL_MS` - Expiry sweep frequency (default: 1000)
    /// - `EVICT_DISPLACED_CONNECTIONS` - `true` to clear stale reverse entries (default: false)
    /// - `DIRECTORY_FILE` - Path to the user directory JSON (default: unset)
    /// - `EMIT_API_KEY` - Key expected in the `x-api-key` header of `/emit/*`
    ///   (default: unset, which disables the emit API)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            admin_cache_max_entries: env_or(
                "ADMIN_CACHE_MAX_ENTRIES",
                defaults.admin_cache_max_entries,
            ),
            admin_cache_sliding_ms: env_or(
                "ADMIN_CACHE_SLIDING_MS",
                defaults.admin_cache_sliding_ms,
            ),
            admin_cache_absolute_ms: env_or(
                "ADMIN_CACHE_ABSOLUTE_MS",
                defaults.admin_cache_absolute_ms,
            ),
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            evict_displaced_connections: env_or(
                "EVICT_DISPLACED_CONNECTIONS",
                defaults.evict_displaced_connections,
            ),
            directory_file: env::var_os("DIRECTORY_FILE").map(PathBuf::from),
            emit_api_key: env::var("EMIT_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn admin_cache_options(&self) -> CacheOptions {
        CacheOptions::new(
            self.admin_cache_max_entries,
            Duration::from_millis(self.admin_cache_sliding_ms),
            Duration::from_millis(self.admin_cache_absolute_ms),
        )
    }

    pub fn displaced_connection_policy(&self) -> DisplacedConnectionPolicy {
        if self.evict_displaced_connections {
            DisplacedConnectionPolicy::Evict
        } else {
            DisplacedConnectionPolicy::Retain
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            admin_cache_max_entries: 500,
            admin_cache_sliding_ms: 60_000,
            admin_cache_absolute_ms: 600_000,
            sweep_interval_ms: 1000,
            evict_displaced_connections: false,
            directory_file: None,
            emit_api_key: None,
        }
    }
}
