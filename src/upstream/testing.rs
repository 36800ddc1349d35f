//! In-memory upstream session for tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::UpstreamSession;
use crate::error::UpstreamError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamCall {
    Join(String),
    Depart(String),
    Say(String, String),
    Reply(String, String, String),
}

/// Records every call. Fails them all when `offline` is set.
#[derive(Default)]
pub struct RecordingUpstream {
    calls: Mutex<Vec<UpstreamCall>>,
    pub offline: std::sync::atomic::AtomicBool,
}

impl RecordingUpstream {
    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: UpstreamCall) -> Result<(), UpstreamError> {
        self.calls.lock().push(call);
        if self.offline.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(UpstreamError::Unavailable("offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UpstreamSession for RecordingUpstream {
    async fn join(&self, channel: &str) -> Result<(), UpstreamError> {
        self.record(UpstreamCall::Join(channel.into()))
    }

    async fn depart(&self, channel: &str) -> Result<(), UpstreamError> {
        self.record(UpstreamCall::Depart(channel.into()))
    }

    async fn say(&self, channel: &str, text: &str) -> Result<(), UpstreamError> {
        self.record(UpstreamCall::Say(channel.into(), text.into()))
    }

    async fn reply(
        &self,
        channel: &str,
        parent_id: &str,
        text: &str,
    ) -> Result<(), UpstreamError> {
        self.record(UpstreamCall::Reply(
            channel.into(),
            parent_id.into(),
            text.into(),
        ))
    }
}
