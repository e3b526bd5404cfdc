//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

use crate::workers::status_poller::PollerConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub poller: PollerConfig,
    pub fallback: FallbackConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64, // seconds
}

/// Payment provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Alternate base URL used for the single relay retry when the direct
    /// call fails with a blocked or unreachable transport.
    pub relay_base_url: Option<String>,
    pub request_timeout: u64, // seconds
}

/// Local fallback store configuration
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Path of the file holding the locally stored provider key.
    pub key_path: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            database: DatabaseConfig::from_env()?,
            provider: ProviderConfig::from_env()?,
            poller: PollerConfig::from_env(),
            fallback: FallbackConfig::from_env(),
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.provider.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DATABASE_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("DATABASE_CONNECTION_TIMEOUT".to_string())
                })?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "DATABASE_URL cannot be empty".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "DATABASE_MAX_CONNECTIONS cannot be 0".to_string(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.abacatepay.com/v1".to_string(),
            relay_base_url: None,
            request_timeout: 30,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(ProviderConfig {
            base_url: env::var("ABACATE_BASE_URL").unwrap_or(defaults.base_url),
            relay_base_url: env::var("ABACATE_RELAY_BASE_URL").ok(),
            request_timeout: env::var("ABACATE_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| defaults.request_timeout.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ABACATE_REQUEST_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ABACATE_BASE_URL cannot be empty".to_string(),
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue(
                "ABACATE_REQUEST_TIMEOUT cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            key_path: ".pix_checkout_key".to_string(),
        }
    }
}

impl FallbackConfig {
    pub fn from_env() -> Self {
        Self {
            key_path: env::var("FALLBACK_KEY_PATH").unwrap_or_else(|_| Self::default().key_path),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVariable(String),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}
