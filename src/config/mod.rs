//! Configuration management
//!
//! This module handles loading and parsing configuration for the AstroCall
//! backend. Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. LiveKit
//! credentials are deliberately optional: the service boots without them,
//! and room-token issuance reports an unconfigured error until they are set.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: String, message: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// LiveKit video provider configuration
    #[serde(default)]
    pub livekit: LiveKitConfig,
    /// Session lifecycle configuration
    #[serde(default)]
    pub sessions: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the web frontend)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/astrocall.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// LiveKit video provider configuration
///
/// All three values must be present for room-token issuance to work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveKitConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub ws_url: Option<String>,
}

/// Fully resolved LiveKit credentials
#[derive(Debug, Clone)]
pub struct LiveKitCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub ws_url: String,
}

impl LiveKitConfig {
    /// Returns credentials only when every field is set and non-empty.
    pub fn credentials(&self) -> Option<LiveKitCredentials> {
        let api_key = self.api_key.as_deref().filter(|s| !s.is_empty())?;
        let api_secret = self.api_secret.as_deref().filter(|s| !s.is_empty())?;
        let ws_url = self.ws_url.as_deref().filter(|s| !s.is_empty())?;
        Some(LiveKitCredentials {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            ws_url: ws_url.to_string(),
        })
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds a session may sit in `pending` before the sweep declines it.
    /// 0 disables the sweep.
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_seconds: u64,
    /// How often the sweep runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pending_ttl_seconds: default_pending_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_pending_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    30
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing or empty file yields the defaults.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides.
    ///
    /// Environment variables follow the pattern:
    /// - ASTROCALL_SERVER_HOST / _PORT / _CORS_ORIGIN
    /// - ASTROCALL_DATABASE_DRIVER / _URL
    /// - ASTROCALL_LIVEKIT_API_KEY / _API_SECRET / _WS_URL
    /// - ASTROCALL_PENDING_TTL_SECONDS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ASTROCALL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ASTROCALL_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("ASTROCALL_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("ASTROCALL_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("ASTROCALL_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(key) = std::env::var("ASTROCALL_LIVEKIT_API_KEY") {
            self.livekit.api_key = Some(key);
        }
        if let Ok(secret) = std::env::var("ASTROCALL_LIVEKIT_API_SECRET") {
            self.livekit.api_secret = Some(secret);
        }
        if let Ok(ws_url) = std::env::var("ASTROCALL_LIVEKIT_WS_URL") {
            self.livekit.ws_url = Some(ws_url);
        }

        if let Ok(ttl) = std::env::var("ASTROCALL_PENDING_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.sessions.pending_ttl_seconds = ttl;
            }
        }
    }
}
