//! Privilege recalculation from USERSTATE badges.

use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::db::Database;
use crate::metrics;
use crate::notify::{PrivilegeChange, PrivilegeNotifier};
use crate::scheduler::{MessageScheduler, PrivilegeLevel};
use crate::upstream::EventLine;

/// The level a USERSTATE line grants the relay in its channel.
///
/// Own channel beats moderator beats VIP. Anything else is plain Write.
pub fn derive_level(own_login: &str, line: &EventLine) -> PrivilegeLevel {
    if line.channel.eq_ignore_ascii_case(own_login) {
        PrivilegeLevel::Bot
    } else if line.badges.contains("moderator") || line.badges.contains("broadcaster") || line.is_mod_tag() {
        PrivilegeLevel::Moderator
    } else if line.badges.contains("vip") {
        PrivilegeLevel::Vip
    } else {
        PrivilegeLevel::Write
    }
}

/// Detects level transitions and applies them.
pub struct PrivilegeTracker {
    own_login: String,
    /// Last applied level for channels the scheduler does not track.
    observed: DashMap<String, PrivilegeLevel>,
}

impl PrivilegeTracker {
    pub fn new(own_login: &str) -> Self {
        Self {
            own_login: own_login.to_ascii_lowercase(),
            observed: DashMap::new(),
        }
    }

    async fn recorded_level(
        &self,
        channel: &str,
        scheduler: &MessageScheduler,
        db: &Database,
    ) -> PrivilegeLevel {
        if let Some(level) = scheduler.level(channel) {
            return level;
        }
        if let Some(level) = self.observed.get(channel) {
            return *level;
        }
        match db.channels().find_level(channel).await {
            Ok(level) => level.unwrap_or_default(),
            Err(e) => {
                warn!(channel = %channel, error = %e, "Failed to read stored level");
                PrivilegeLevel::default()
            }
        }
    }

    /// Compare the level `line` implies with the recorded one and, if it
    /// changed, persist it, retime the channel and announce it.
    ///
    /// A recorded Read level is never replaced by a plain Write observation.
    pub async fn recalculate(
        &self,
        line: &EventLine,
        scheduler: &MessageScheduler,
        db: &Database,
        notifier: &dyn PrivilegeNotifier,
    ) -> Option<PrivilegeChange> {
        let channel = line.channel.as_str();
        let observed = derive_level(&self.own_login, line);
        let recorded = self.recorded_level(channel, scheduler, db).await;

        if observed == recorded || (recorded == PrivilegeLevel::Read && observed == PrivilegeLevel::Write) {
            return None;
        }

        match db.channels().set_level(channel, observed).await {
            Ok(true) => {}
            Ok(false) => warn!(channel = %channel, "No stored record for channel, level not persisted"),
            Err(e) => warn!(channel = %channel, error = %e, "Failed to persist level"),
        }
        if !scheduler.retime(channel, observed) {
            self.observed.insert(channel.to_owned(), observed);
        }

        info!(channel = %channel, from = %recorded, to = %observed, "Privilege level changed");
        metrics::inc_privilege_transition(observed.name());

        let change = PrivilegeChange {
            channel: channel.to_owned(),
            level: observed,
            previous: recorded,
            at: Utc::now(),
        };
        if let Err(e) = notifier.publish(&change).await {
            warn!(channel = %channel, error = %e, "Failed to publish privilege change");
        }
        Some(change)
    }
}
