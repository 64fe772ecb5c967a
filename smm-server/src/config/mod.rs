//! Configuration module for smm-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{FileConfig, GatewayConfig};
use rust_decimal::Decimal;
use smm_core::config::{NotificationConfig, StoreSettings};
use smm_core::poller::PollConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    /// Reloadable on SIGHUP.
    pub store: StoreSettings,
    /// Read once at startup.
    pub gateway: GatewayConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read the TOML file, apply CLI overrides and validate.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.store.express_fee_percent < Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "store.express_fee_percent must not be negative".to_string(),
        ));
    }
    if config.poll.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "poll.interval_secs must be positive".to_string(),
        ));
    }
    if config.poll.timeout_secs < config.poll.interval_secs {
        return Err(ConfigError::ValidationError(
            "poll.timeout_secs must be at least poll.interval_secs".to_string(),
        ));
    }
    if let Some(notifications) = &config.notifications {
        if !matches!(notifications.webhook_url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "notifications.webhook_url must be http(s), got {}",
                notifications.webhook_url
            )));
        }
        if notifications.secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "notifications.secret must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let notifications = file_config.notifications.map(|n| NotificationConfig {
        webhook_url: n.webhook_url,
        secret: n.secret.into_bytes().into_boxed_slice(),
    });

    LoadedConfig {
        listen: file_config.server.listen,
        store: StoreSettings {
            express_enabled: file_config.store.express_enabled,
            express_fee_percent: file_config.store.express_fee_percent,
            notifications,
            poll: PollConfig {
                interval: Duration::from_secs(file_config.poll.interval_secs),
                timeout: Duration::from_secs(file_config.poll.timeout_secs),
            },
        },
        gateway: file_config.gateway,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
