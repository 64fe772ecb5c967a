//! TOML file configuration structures.
//!
//! These structs directly map to the `smm-config.toml` file format.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Omit the section to disable order notifications.
    #[serde(default)]
    pub notifications: Option<NotificationsConfig>,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Pricing options shared by every service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub express_enabled: bool,
    /// Express surcharge in percent.
    #[serde(default)]
    pub express_fee_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Relay that forwards order notifications to WhatsApp/e-mail.
    pub webhook_url: Url,
    /// Secret for the `Smm-Signature` HMAC.
    pub secret: String,
}

/// Payment confirmation polling, served to checkout clients by `GET /settings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    3
}

fn default_poll_timeout() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Seconds before the sandbox gateway approves a PIX charge.
    #[serde(default = "default_sandbox_approve_after")]
    pub sandbox_approve_after_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sandbox_approve_after_secs: default_sandbox_approve_after(),
        }
    }
}

fn default_sandbox_approve_after() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[store]
express_enabled = true
express_fee_percent = "20"

[notifications]
webhook_url = "https://relay.example.com/hooks/orders"
secret = "relay-secret"

[poll]
interval_secs = 5

[gateway]
sandbox_approve_after_secs = 10
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert!(config.store.express_enabled);
        assert_eq!(config.store.express_fee_percent, Decimal::from(20));
        let notifications = config.notifications.unwrap();
        assert_eq!(notifications.webhook_url.host_str(), Some("relay.example.com"));
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.timeout_secs, 600);
        assert_eq!(config.gateway.sandbox_approve_after_secs, 10);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert!(!config.store.express_enabled);
        assert!(config.notifications.is_none());
        assert_eq!(config.poll.interval_secs, 3);
        assert_eq!(config.gateway.sandbox_approve_after_secs, 30);
    }
}
