//! Privilege levels and the send cooldown each one allows.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The relay's standing in one channel. Ordered from least to most privileged.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PrivilegeLevel {
    Read,
    #[default]
    Write,
    #[serde(rename = "VIP")]
    Vip,
    Moderator,
    Bot,
}

impl PrivilegeLevel {
    /// All levels in ascending order.
    pub const ALL: [PrivilegeLevel; 5] = [
        PrivilegeLevel::Read,
        PrivilegeLevel::Write,
        PrivilegeLevel::Vip,
        PrivilegeLevel::Moderator,
        PrivilegeLevel::Bot,
    ];

    /// Minimum spacing between two sends in a channel at this level.
    pub const fn cooldown(self) -> Duration {
        match self {
            PrivilegeLevel::Read | PrivilegeLevel::Write => Duration::from_millis(1250),
            PrivilegeLevel::Vip => Duration::from_millis(250),
            PrivilegeLevel::Moderator | PrivilegeLevel::Bot => Duration::from_millis(50),
        }
    }

    /// Stored integer form (`channels.bot_permission`).
    pub const fn as_i64(self) -> i64 {
        match self {
            PrivilegeLevel::Read => 0,
            PrivilegeLevel::Write => 1,
            PrivilegeLevel::Vip => 2,
            PrivilegeLevel::Moderator => 3,
            PrivilegeLevel::Bot => 4,
        }
    }

    pub const fn from_i64(value: i64) -> Option<PrivilegeLevel> {
        match value {
            0 => Some(PrivilegeLevel::Read),
            1 => Some(PrivilegeLevel::Write),
            2 => Some(PrivilegeLevel::Vip),
            3 => Some(PrivilegeLevel::Moderator),
            4 => Some(PrivilegeLevel::Bot),
            _ => None,
        }
    }

    /// Name used in logs, metrics labels and notifications.
    pub const fn name(self) -> &'static str {
        match self {
            PrivilegeLevel::Read => "Read",
            PrivilegeLevel::Write => "Write",
            PrivilegeLevel::Vip => "VIP",
            PrivilegeLevel::Moderator => "Moderator",
            PrivilegeLevel::Bot => "Bot",
        }
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
