//! The single session with the upstream chat server.
//!
//! [`UpstreamSession`] is what the rest of the relay calls into; events
//! coming back from the server arrive as [`UpstreamEvent`]s on a channel.

mod event;
#[cfg(test)]
pub mod testing;
mod tmi;

pub use event::{EventLine, UpstreamEvent};
pub use tmi::TmiClient;

use async_trait::async_trait;

use crate::error::UpstreamError;

/// Commands the relay issues against the upstream session.
///
/// Channel arguments are bare names without `#`.
#[async_trait]
pub trait UpstreamSession: Send + Sync + 'static {
    async fn join(&self, channel: &str) -> Result<(), UpstreamError>;
    async fn depart(&self, channel: &str) -> Result<(), UpstreamError>;
    async fn say(&self, channel: &str, text: &str) -> Result<(), UpstreamError>;
    async fn reply(&self, channel: &str, parent_id: &str, text: &str)
    -> Result<(), UpstreamError>;
}
