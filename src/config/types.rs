//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::listen::ListenConfig;
use super::scheduler::SchedulerConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Upstream chat identity and server.
    pub twitch: TwitchConfig,
    /// Local proxy listener.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Health and metrics HTTP endpoint.
    #[serde(default)]
    pub status: StatusConfig,
    /// Channel persistence.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Outbound queue limits.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Duplicate-message marker.
    #[serde(default)]
    pub evasion: EvasionConfig,
    /// Privilege change announcements.
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Upstream session identity.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitchConfig {
    /// Login name of the relay account (lowercase).
    pub username: String,
    /// OAuth token, with or without the `oauth:` prefix.
    pub oauth: String,
    /// Verified bots get a much larger join allowance.
    #[serde(default)]
    pub verified: bool,
    /// `host:port` of the chat server.
    #[serde(default = "default_twitch_address")]
    pub address: String,
    #[serde(default = "default_true")]
    pub tls: bool,
}

fn default_twitch_address() -> String {
    "irc.chat.twitch.tv:6697".to_string()
}

fn default_true() -> bool {
    true
}

impl TwitchConfig {
    /// The token without its `oauth:` prefix.
    pub fn token(&self) -> &str {
        self.oauth.strip_prefix("oauth:").unwrap_or(&self.oauth)
    }

    /// Host part of [`TwitchConfig::address`], used for TLS server name.
    pub fn host(&self) -> &str {
        self.address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.address)
    }
}

/// Status endpoint configuration. A port of 0 disables the endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_status_address")]
    pub address: SocketAddr,
}

fn default_status_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}

impl StatusConfig {
    pub fn enabled(&self) -> bool {
        self.address.port() != 0
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            address: default_status_address(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "relay.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Marker toggled onto consecutive identical messages.
#[derive(Debug, Clone, Deserialize)]
pub struct EvasionConfig {
    /// Must be a single character. Defaults to U+E0000.
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_marker() -> String {
    '\u{E0000}'.to_string()
}

impl EvasionConfig {
    /// The marker character. Falls back to the default if misconfigured.
    pub fn marker_char(&self) -> char {
        let mut chars = self.marker.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => '\u{E0000}',
        }
    }
}

impl Default for EvasionConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
        }
    }
}

/// Privilege change notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Redis URL. Without it, notifications stay in process.
    pub redis_url: Option<String>,
    /// Prepended to `channel`.
    #[serde(default = "default_notify_prefix")]
    pub prefix: String,
    #[serde(default = "default_notify_channel")]
    pub channel: String,
}

fn default_notify_prefix() -> String {
    "tmi-relay:".to_string()
}

fn default_notify_channel() -> String {
    "privilege".to_string()
}

impl NotifyConfig {
    /// Full pub/sub channel name.
    pub fn topic(&self) -> String {
        format!("{}{}", self.prefix, self.channel)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            prefix: default_notify_prefix(),
            channel: default_notify_channel(),
        }
    }
}
