//! Outbound queue configuration.

use serde::Deserialize;

/// What to do when a channel queue is full.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued message.
    #[default]
    DropOldest,
    /// Discard the incoming message.
    RejectNew,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum queued messages per channel, catch-all included.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

fn default_queue_capacity() -> usize {
    500
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy() {
        let cfg: SchedulerConfig = toml::from_str(
            r#"
            queue_capacity = 10
            overflow = "reject-new"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.queue_capacity, 10);
        assert_eq!(cfg.overflow, OverflowPolicy::RejectNew);

        let cfg: SchedulerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.queue_capacity, 500);
        assert_eq!(cfg.overflow, OverflowPolicy::DropOldest);
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(toml::from_str::<SchedulerConfig>(r#"overflow = "block""#).is_err());
    }
}
