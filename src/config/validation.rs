//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("twitch.username is required")]
    MissingUsername,
    #[error("twitch.username must be a lowercase login name, got '{0}'")]
    InvalidUsername(String),
    #[error("twitch.oauth is required")]
    MissingOauth,
    #[error("twitch.address must be host:port, got '{0}'")]
    InvalidUpstreamAddress(String),
    #[error("evasion.marker must be exactly one character, got {0}")]
    InvalidMarker(usize),
    #[error("scheduler.queue_capacity must be greater than 0")]
    ZeroQueueCapacity,
    #[error("listen.send_queue must be greater than 0")]
    ZeroSendQueue,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let username = &config.twitch.username;
    if username.is_empty() {
        errors.push(ValidationError::MissingUsername);
    } else if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        errors.push(ValidationError::InvalidUsername(username.clone()));
    }

    if config.twitch.token().is_empty() {
        errors.push(ValidationError::MissingOauth);
    }

    let port_ok = config
        .twitch
        .address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if !port_ok {
        errors.push(ValidationError::InvalidUpstreamAddress(
            config.twitch.address.clone(),
        ));
    }

    let marker_len = config.evasion.marker.chars().count();
    if marker_len != 1 {
        errors.push(ValidationError::InvalidMarker(marker_len));
    }

    if config.scheduler.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }
    if config.listen.send_queue == 0 {
        errors.push(ValidationError::ZeroSendQueue);
    }

    if config.database.path != ":memory:"
        && let Some(parent) = Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(
            parent.display().to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn minimal_config_is_valid() {
        let config = parse(
            r#"
            [twitch]
            username = "relaybot"
            oauth = "oauth:abc"
            "#,
        );
        assert_eq!(validate(&config), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let config = parse(
            r#"
            [twitch]
            username = "RelayBot"
            oauth = "oauth:"
            address = "nohost"

            [evasion]
            marker = "ab"

            [scheduler]
            queue_capacity = 0

            [database]
            path = "/definitely/not/here/relay.db"
            "#,
        );
        let errors = validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidUsername("RelayBot".into()),
                ValidationError::MissingOauth,
                ValidationError::InvalidUpstreamAddress("nohost".into()),
                ValidationError::InvalidMarker(2),
                ValidationError::ZeroQueueCapacity,
                ValidationError::DatabasePathInvalid("/definitely/not/here".into()),
            ]
        );
    }

    #[test]
    fn database_in_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.db");
        let config = parse(&format!(
            r#"
            [twitch]
            username = "relaybot"
            oauth = "abc"

            [database]
            path = "{}"
            "#,
            path.display()
        ));
        assert!(validate(&config).is_ok());
    }
}
