//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Failed to read {path}: {message}")]
    ReadFile { path: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Approval workflow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Whole-apply attempts before a numbering conflict is surfaced to the caller
    pub apply_max_attempts: u32,
    pub notifications_enabled: bool,
    /// JSON file with the actors known to the identity directory
    pub actors_file: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            apply_max_attempts: 3,
            notifications_enabled: true,
            actors_file: None,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub workflow: WorkflowConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: std::env::var("HOST")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        let cors = CorsConfig {
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let workflow = WorkflowConfig {
            apply_max_attempts: Self::parse_attempts(std::env::var("APPLY_MAX_ATTEMPTS").ok())?,
            notifications_enabled: std::env::var("NOTIFICATIONS_ENABLED")
                .ok()
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            actors_file: std::env::var("ACTORS_FILE").ok().map(PathBuf::from),
        };

        Ok(Self {
            server,
            cors,
            workflow,
        })
    }

    fn parse_attempts(raw: Option<String>) -> Result<u32, ConfigError> {
        let Some(raw) = raw else {
            return Ok(WorkflowConfig::default().apply_max_attempts);
        };
        match raw.trim().parse::<u32>() {
            Ok(0) => Err(ConfigError::InvalidValue(
                "APPLY_MAX_ATTEMPTS must be at least 1".to_string(),
            )),
            Ok(n) => Ok(n),
            Err(_) => Err(ConfigError::InvalidValue(format!(
                "APPLY_MAX_ATTEMPTS must be a positive integer, got '{}'",
                raw
            ))),
        }
    }
}
