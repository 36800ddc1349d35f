//! One channel's pending sends and current privilege level.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use super::permission::PrivilegeLevel;
use crate::config::OverflowPolicy;

/// A chat line waiting to be sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination channel, normalized (no `#`, lowercase).
    pub channel: String,
    pub text: String,
    /// Message id this line replies to.
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    pub fn say(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            reply_to: None,
        }
    }

    pub fn reply(
        channel: impl Into<String>,
        parent_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            reply_to: Some(parent_id.into()),
        }
    }
}

/// Result of pushing onto a bounded queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full and its head was discarded to make room.
    DroppedOldest,
    /// The queue was full and the new message was discarded.
    Rejected,
}

struct ScheduleState {
    level: PrivilegeLevel,
    queue: VecDeque<OutboundMessage>,
}

/// Queue plus level for one channel.
///
/// Both fields sit behind one mutex: the dispatch loop pops while callers
/// push or retime, and neither side holds the lock across an await.
pub(crate) struct ChannelSchedule {
    name: String,
    capacity: usize,
    overflow: OverflowPolicy,
    state: Mutex<ScheduleState>,
}

impl ChannelSchedule {
    pub(crate) fn new(
        name: String,
        level: PrivilegeLevel,
        capacity: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            overflow,
            state: Mutex::new(ScheduleState {
                level,
                queue: VecDeque::new(),
            }),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn level(&self) -> PrivilegeLevel {
        self.state.lock().level
    }

    pub(crate) fn set_level(&self, level: PrivilegeLevel) -> PrivilegeLevel {
        std::mem::replace(&mut self.state.lock().level, level)
    }

    pub(crate) fn cooldown(&self) -> Duration {
        self.level().cooldown()
    }

    pub(crate) fn push(&self, msg: OutboundMessage) -> PushOutcome {
        let mut state = self.state.lock();
        if state.queue.len() < self.capacity {
            state.queue.push_back(msg);
            return PushOutcome::Queued;
        }
        match self.overflow {
            OverflowPolicy::DropOldest => {
                state.queue.pop_front();
                state.queue.push_back(msg);
                PushOutcome::DroppedOldest
            }
            OverflowPolicy::RejectNew => PushOutcome::Rejected,
        }
    }

    pub(crate) fn pop(&self) -> Option<OutboundMessage> {
        self.state.lock().queue.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }
}
