//! Configuration management
//!
//! This module handles loading and parsing configuration for the media tag service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Tag behaviour configuration
    #[serde(default)]
    pub tags: TagConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
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
    3000
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Upper bound on pooled connections
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
    "data/media.db".to_string()
}

fn default_max_connections() -> u32 {
    10
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

/// Tag configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagConfig {
    /// How tag names are compared for duplicate detection and lookups
    #[serde(default)]
    pub name_matching: NameMatching,
    /// Maximum tag name length in characters
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            name_matching: NameMatching::default(),
            max_name_length: default_max_name_length(),
        }
    }
}

/// Width of the `tag_name` column
const TAG_NAME_COLUMN_WIDTH: usize = 255;

fn default_max_name_length() -> usize {
    50
}

/// Tag name comparison mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NameMatching {
    /// Byte-for-byte match (default)
    #[default]
    Exact,
    /// "Cats" and "cats" are the same tag
    CaseInsensitive,
}

impl NameMatching {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "case_insensitive" | "case-insensitive" => Some(Self::CaseInsensitive),
            _ => None,
        }
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
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

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - MEDIA_TAGS_SERVER_HOST
    /// - MEDIA_TAGS_SERVER_PORT
    /// - MEDIA_TAGS_SERVER_CORS_ORIGIN
    /// - MEDIA_TAGS_DATABASE_DRIVER
    /// - MEDIA_TAGS_DATABASE_URL
    /// - MEDIA_TAGS_DATABASE_MAX_CONNECTIONS
    /// - MEDIA_TAGS_TAGS_NAME_MATCHING
    /// - MEDIA_TAGS_TAGS_MAX_NAME_LENGTH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be greater than 0".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.tags.max_name_length == 0 {
            return Err(ConfigError::ValidationError(
                "tags.max_name_length must be greater than 0".to_string(),
            ));
        }
        if self.tags.max_name_length > TAG_NAME_COLUMN_WIDTH {
            return Err(ConfigError::ValidationError(format!(
                "tags.max_name_length must not exceed {}",
                TAG_NAME_COLUMN_WIDTH
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("MEDIA_TAGS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("MEDIA_TAGS_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("MEDIA_TAGS_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("MEDIA_TAGS_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("MEDIA_TAGS_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(max) = std::env::var("MEDIA_TAGS_DATABASE_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse::<u32>() {
                self.database.max_connections = max;
            }
        }

        // Tag configuration
        if let Ok(matching) = std::env::var("MEDIA_TAGS_TAGS_NAME_MATCHING") {
            if let Some(matching) = NameMatching::parse(&matching) {
                self.tags.name_matching = matching;
            }
        }
        if let Ok(len) = std::env::var("MEDIA_TAGS_TAGS_MAX_NAME_LENGTH") {
            if let Ok(len) = len.parse::<usize>() {
                self.tags.max_name_length = len;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "MEDIA_TAGS_SERVER_HOST",
    "MEDIA_TAGS_SERVER_PORT",
    "MEDIA_TAGS_SERVER_CORS_ORIGIN",
    "MEDIA_TAGS_DATABASE_DRIVER",
    "MEDIA_TAGS_DATABASE_URL",
    "MEDIA_TAGS_DATABASE_MAX_CONNECTIONS",
    "MEDIA_TAGS_TAGS_NAME_MATCHING",
    "MEDIA_TAGS_TAGS_MAX_NAME_LENGTH",
];
