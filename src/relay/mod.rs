//! The relay: composition root tying the scheduler, the upstream session
//! and the local clients together.
//!
//! ```text
//! client line ──▶ handlers ──▶ MessageScheduler ──▶ UpstreamDispatcher ──▶ upstream say/reply
//! upstream event ──▶ Relay::handle_event ──▶ ConnectionSet::broadcast
//!                                      └──▶ PrivilegeTracker ──▶ retime / persist / notify
//! ```

pub mod evasion;
pub mod privilege;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::db::{Database, DbError};
use crate::network::ConnectionSet;
use crate::notify::{PrivilegeChange, PrivilegeNotifier};
use crate::scheduler::{Dispatcher, MessageScheduler, OutboundMessage};
use crate::status::StatusSnapshot;
use crate::upstream::{UpstreamEvent, UpstreamSession};
use evasion::DuplicateGuard;
use privilege::PrivilegeTracker;

/// Sends scheduled messages upstream, applying duplicate-send evasion.
pub struct UpstreamDispatcher {
    upstream: Arc<dyn UpstreamSession>,
    guard: DuplicateGuard,
}

impl UpstreamDispatcher {
    pub fn new(upstream: Arc<dyn UpstreamSession>, marker: char) -> Self {
        Self {
            upstream,
            guard: DuplicateGuard::new(marker),
        }
    }
}

#[async_trait]
impl Dispatcher for UpstreamDispatcher {
    async fn dispatch(&self, msg: OutboundMessage) {
        let payload = self.guard.prepare(&msg.channel, &msg.text);
        let result = match &msg.reply_to {
            Some(parent) => self.upstream.reply(&msg.channel, parent, &payload).await,
            None => self.upstream.say(&msg.channel, &payload).await,
        };
        if let Err(e) = result {
            warn!(channel = %msg.channel, error = %e, code = e.error_code(), "Upstream send failed");
        }
    }
}

/// Settings the relay needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Login of the upstream account.
    pub own_login: String,
    pub scheduler: SchedulerConfig,
    /// Duplicate-send marker.
    pub marker: char,
}

pub struct Relay {
    own_login: String,
    scheduler: MessageScheduler,
    connections: ConnectionSet,
    db: Database,
    upstream: Arc<dyn UpstreamSession>,
    notifier: Arc<dyn PrivilegeNotifier>,
    privileges: PrivilegeTracker,
}

impl Relay {
    pub fn new(
        options: RelayOptions,
        db: Database,
        upstream: Arc<dyn UpstreamSession>,
        notifier: Arc<dyn PrivilegeNotifier>,
        shutdown: broadcast::Sender<()>,
    ) -> Arc<Self> {
        let own_login = options.own_login.to_ascii_lowercase();
        let dispatcher = Arc::new(UpstreamDispatcher::new(
            Arc::clone(&upstream),
            options.marker,
        ));
        Arc::new(Self {
            scheduler: MessageScheduler::new(dispatcher, options.scheduler, shutdown),
            connections: ConnectionSet::new(),
            privileges: PrivilegeTracker::new(&own_login),
            own_login,
            db,
            upstream,
            notifier,
        })
    }

    pub fn own_login(&self) -> &str {
        &self.own_login
    }

    pub fn scheduler(&self) -> &MessageScheduler {
        &self.scheduler
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn upstream(&self) -> &dyn UpstreamSession {
        self.upstream.as_ref()
    }

    /// Schedule and join every persisted channel at its stored level.
    pub async fn restore_channels(&self) -> Result<usize, DbError> {
        let records = self.db.channels().load_all().await?;
        for record in &records {
            self.scheduler.add_channel(&record.name, record.level);
            if let Err(e) = self.upstream.join(&record.name).await {
                warn!(channel = %record.name, error = %e, "Failed to join persisted channel");
            }
        }
        info!(count = records.len(), "Persisted channels restored");
        Ok(records.len())
    }

    /// Forward a raw upstream line to every local client.
    pub fn broadcast(&self, raw: &str) -> usize {
        self.connections.broadcast(&format!("{raw}\r\n"))
    }

    pub async fn handle_event(&self, event: UpstreamEvent) -> Option<PrivilegeChange> {
        match event {
            UpstreamEvent::Connected => info!("Upstream session ready"),
            UpstreamEvent::Reconnect => debug!("Upstream reconnect requested"),
            UpstreamEvent::SelfJoin(line) => info!(channel = %line.channel, "Joined channel"),
            UpstreamEvent::SelfPart(line) => info!(channel = %line.channel, "Departed channel"),
            UpstreamEvent::UserState(line) => {
                self.broadcast(&line.raw);
                // USERSTATE always describes the relay's own account
                return self
                    .privileges
                    .recalculate(&line, &self.scheduler, &self.db, self.notifier.as_ref())
                    .await;
            }
            UpstreamEvent::PrivateMessage(line)
            | UpstreamEvent::Notice(line)
            | UpstreamEvent::UserJoin(line)
            | UpstreamEvent::UserPart(line) => {
                self.broadcast(&line.raw);
            }
        }
        None
    }

    /// Consume upstream events until shutdown or the session goes away.
    pub async fn run_events(
        self: Arc<Self>,
        mut events: mpsc::Receiver<UpstreamEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event).await;
                    }
                    None => break,
                },
            }
        }
        debug!("Upstream event loop exited");
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::collect(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ConnectionHandle;
    use crate::notify::BroadcastNotifier;
    use crate::scheduler::PrivilegeLevel;
    use crate::upstream::testing::{RecordingUpstream, UpstreamCall};
    use std::time::Duration;
    use tokio::sync::Notify;

    async fn relay() -> (Arc<Relay>, Arc<RecordingUpstream>, broadcast::Sender<()>) {
        let upstream = Arc::new(RecordingUpstream::default());
        let (shutdown, _) = broadcast::channel(1);
        let relay = Relay::new(
            RelayOptions {
                own_login: "RelayBot".into(),
                scheduler: SchedulerConfig::default(),
                marker: '\u{E0000}',
            },
            Database::new(":memory:").await.unwrap(),
            upstream.clone(),
            Arc::new(BroadcastNotifier::new(8)),
            shutdown.clone(),
        );
        (relay, upstream, shutdown)
    }

    fn event(raw: &str) -> UpstreamEvent {
        UpstreamEvent::classify(raw, raw.parse().unwrap(), "relaybot").unwrap()
    }

    #[tokio::test]
    async fn repeated_text_alternates_marker() {
        let (relay, upstream, _shutdown) = relay().await;
        tokio::time::pause();
        relay.scheduler().add_channel("chan", PrivilegeLevel::Moderator);
        for _ in 0..3 {
            relay.scheduler().enqueue(OutboundMessage::say("chan", "gg"));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(
            upstream.calls(),
            [
                UpstreamCall::Say("chan".into(), "gg".into()),
                UpstreamCall::Say("chan".into(), "gg\u{E0000}".into()),
                UpstreamCall::Say("chan".into(), "gg".into()),
            ]
        );
    }

    #[tokio::test]
    async fn reply_target_is_used() {
        let (relay, upstream, _shutdown) = relay().await;
        tokio::time::pause();
        relay.scheduler().add_channel("chan", PrivilegeLevel::Bot);
        relay
            .scheduler()
            .enqueue(OutboundMessage::reply("chan", "abc", "yes"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            upstream.calls(),
            [UpstreamCall::Reply("chan".into(), "abc".into(), "yes".into())]
        );
    }

    #[tokio::test]
    async fn chat_events_are_broadcast_verbatim() {
        let (relay, _upstream, _shutdown) = relay().await;
        let (tx, mut rx) = mpsc::channel(8);
        relay.connections().insert(
            1,
            ConnectionHandle {
                sender: tx,
                kill: Arc::new(Notify::new()),
            },
        );

        let raw = "@badges=;color= :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #forsen :hello  there";
        relay.handle_event(event(raw)).await;
        relay
            .handle_event(event(":relaybot!relaybot@relaybot.tmi.twitch.tv JOIN #forsen"))
            .await;
        relay
            .handle_event(event(":viewer!viewer@viewer.tmi.twitch.tv PART #forsen"))
            .await;

        assert_eq!(rx.recv().await.unwrap(), format!("{raw}\r\n"));
        assert_eq!(
            rx.recv().await.unwrap(),
            ":viewer!viewer@viewer.tmi.twitch.tv PART #forsen\r\n"
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn userstate_is_broadcast_and_retimes() {
        let (relay, _upstream, _shutdown) = relay().await;
        relay.scheduler().add_channel("forsen", PrivilegeLevel::Write);

        let change = relay
            .handle_event(event("@badges=moderator/1 :tmi.twitch.tv USERSTATE #forsen"))
            .await;
        assert_eq!(change.map(|c| c.level), Some(PrivilegeLevel::Moderator));
        assert_eq!(relay.scheduler().level("forsen"), Some(PrivilegeLevel::Moderator));
    }

    #[tokio::test]
    async fn restores_persisted_channels() {
        let (relay, upstream, _shutdown) = relay().await;
        relay
            .db()
            .channels()
            .upsert("forsen", Some("22484632"), PrivilegeLevel::Vip)
            .await
            .unwrap();

        assert_eq!(relay.restore_channels().await.unwrap(), 1);
        assert_eq!(relay.scheduler().level("forsen"), Some(PrivilegeLevel::Vip));
        assert_eq!(upstream.calls(), [UpstreamCall::Join("forsen".into())]);
    }
}
