//! Configuration loading and management.
//!
//! - [`types`]: top level `Config`, upstream identity, storage, status and notification sections
//! - [`listen`]: local proxy listener
//! - [`scheduler`]: queue bounds and overflow policy
//! - [`validation`]: startup checks

mod listen;
mod scheduler;
mod types;
pub mod validation;

pub use listen::ListenConfig;
pub use scheduler::{OverflowPolicy, SchedulerConfig};
pub use types::{
    Config, ConfigError, DatabaseConfig, EvasionConfig, NotifyConfig, StatusConfig, TwitchConfig,
};
