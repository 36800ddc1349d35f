//! Per-channel outbound message scheduling.
//!
//! Every tracked channel gets its own dispatch task. A task wakes once per
//! cooldown, pops at most one message and hands it to the [`Dispatcher`].
//! Messages for channels that are not tracked go to a catch-all schedule
//! that always runs at the [`PrivilegeLevel::Write`] cooldown.

pub mod permission;
mod schedule;

pub use permission::PrivilegeLevel;
pub use schedule::{OutboundMessage, PushOutcome};

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{broadcast, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::metrics;
use schedule::ChannelSchedule;

/// Receives each message when its channel's cooldown allows it to be sent.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    async fn dispatch(&self, msg: OutboundMessage);
}

/// Where an enqueued message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueReceipt {
    /// True when the channel was not tracked and the catch-all took the message.
    pub catch_all: bool,
    pub outcome: PushOutcome,
}

/// Channel names are compared without `#` and case-insensitively.
pub fn normalize_channel(name: &str) -> String {
    name.trim().trim_start_matches('#').to_ascii_lowercase()
}

/// A running schedule. Dropping the handle stops its dispatch task.
struct ScheduleHandle {
    schedule: Arc<ChannelSchedule>,
    _cancel: oneshot::Sender<()>,
}

/// Owns every channel schedule and its dispatch task.
pub struct MessageScheduler {
    channels: DashMap<String, ScheduleHandle>,
    catch_all: ScheduleHandle,
    dispatcher: Arc<dyn Dispatcher>,
    config: SchedulerConfig,
    shutdown: broadcast::Sender<()>,
}

impl MessageScheduler {
    /// Create the scheduler and start the catch-all task.
    ///
    /// Every dispatch task also exits when `shutdown` fires; queued messages
    /// are discarded at that point.
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        config: SchedulerConfig,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        let catch_all = Self::start(
            "*".to_string(),
            PrivilegeLevel::Write,
            &config,
            &dispatcher,
            &shutdown,
        );
        Self {
            channels: DashMap::new(),
            catch_all,
            dispatcher,
            config,
            shutdown,
        }
    }

    fn start(
        name: String,
        level: PrivilegeLevel,
        config: &SchedulerConfig,
        dispatcher: &Arc<dyn Dispatcher>,
        shutdown: &broadcast::Sender<()>,
    ) -> ScheduleHandle {
        let schedule = Arc::new(ChannelSchedule::new(
            name,
            level,
            config.queue_capacity,
            config.overflow,
        ));
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let first_tick = Instant::now() + schedule.cooldown();

        tokio::spawn(dispatch_loop(
            Arc::clone(&schedule),
            Arc::clone(dispatcher),
            first_tick,
            cancel_rx,
            shutdown.subscribe(),
        ));

        ScheduleHandle {
            schedule,
            _cancel: cancel_tx,
        }
    }

    /// Start tracking `name` at `level`. Returns false if it was already tracked.
    pub fn add_channel(&self, name: &str, level: PrivilegeLevel) -> bool {
        let name = normalize_channel(name);
        let added = match self.channels.entry(name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Self::start(
                    name.clone(),
                    level,
                    &self.config,
                    &self.dispatcher,
                    &self.shutdown,
                ));
                true
            }
        };
        if added {
            info!(channel = %name, level = %level, "Channel schedule started");
            metrics::set_tracked_channels(self.channels.len());
        } else {
            debug!(channel = %name, "Channel already scheduled");
        }
        added
    }

    /// Stop tracking `name`. Its queued messages are discarded.
    pub fn remove_channel(&self, name: &str) -> Result<(), SchedulerError> {
        let name = normalize_channel(name);
        let (_, handle) = self
            .channels
            .remove(&name)
            .ok_or_else(|| SchedulerError::ChannelNotFound(name.clone()))?;

        let discarded = handle.schedule.len();
        if discarded > 0 {
            warn!(channel = %name, discarded, "Channel removed with queued messages");
        }
        info!(channel = %name, "Channel schedule stopped");
        metrics::set_tracked_channels(self.channels.len());
        Ok(())
    }

    /// Queue a message on its channel, or on the catch-all if the channel is untracked.
    pub fn enqueue(&self, mut msg: OutboundMessage) -> EnqueueReceipt {
        msg.channel = normalize_channel(&msg.channel);
        let channel = msg.channel.clone();

        let receipt = match self.channels.get(&channel) {
            Some(handle) => EnqueueReceipt {
                catch_all: false,
                outcome: handle.schedule.push(msg),
            },
            None => EnqueueReceipt {
                catch_all: true,
                outcome: self.catch_all.schedule.push(msg),
            },
        };

        match receipt.outcome {
            PushOutcome::Queued => metrics::inc_enqueued(),
            PushOutcome::DroppedOldest => {
                metrics::inc_enqueued();
                metrics::inc_dropped("drop_oldest");
                warn!(channel = %channel, catch_all = receipt.catch_all, "Queue full, dropped oldest message");
            }
            PushOutcome::Rejected => {
                metrics::inc_dropped("reject_new");
                warn!(channel = %channel, catch_all = receipt.catch_all, "Queue full, rejected message");
            }
        }
        receipt
    }

    /// Change the level of a tracked channel. The new cooldown applies from
    /// the next tick on. Untracked channels are ignored and yield false.
    pub fn retime(&self, name: &str, level: PrivilegeLevel) -> bool {
        let name = normalize_channel(name);
        match self.channels.get(&name) {
            Some(handle) => {
                let previous = handle.schedule.set_level(level);
                debug!(channel = %name, from = %previous, to = %level, "Channel retimed");
                true
            }
            None => false,
        }
    }

    pub fn level(&self, name: &str) -> Option<PrivilegeLevel> {
        self.channels
            .get(&normalize_channel(name))
            .map(|h| h.schedule.level())
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.channels.contains_key(&normalize_channel(name))
    }

    /// Tracked channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn tracked_count(&self) -> usize {
        self.channels.len()
    }

    pub fn queue_len(&self, name: &str) -> Option<usize> {
        self.channels
            .get(&normalize_channel(name))
            .map(|h| h.schedule.len())
    }

    pub fn catch_all_len(&self) -> usize {
        self.catch_all.schedule.len()
    }

    /// Messages waiting across all schedules, catch-all included.
    pub fn queued_total(&self) -> usize {
        self.catch_all_len()
            + self
                .channels
                .iter()
                .map(|e| e.value().schedule.len())
                .sum::<usize>()
    }
}

/// Wait for each tick, send at most one message, then schedule the next tick
/// one cooldown after the tick that just fired. The cooldown is re-read every
/// time so a retime applies from the following send.
async fn dispatch_loop(
    schedule: Arc<ChannelSchedule>,
    dispatcher: Arc<dyn Dispatcher>,
    mut next: Instant,
    mut cancel: oneshot::Receiver<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = shutdown.recv() => break,
            _ = sleep_until(next) => {}
        }

        let fired = Instant::now();
        if let Some(msg) = schedule.pop() {
            metrics::inc_dispatched();
            dispatcher.dispatch(msg).await;
        }
        next = fired + schedule.cooldown();
    }
    debug!(channel = %schedule.name(), "Dispatch loop exited");
}
