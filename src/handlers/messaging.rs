//! PRIVMSG handler: the only path from local clients into the scheduler.

use async_trait::async_trait;
use tmi_proto::{Message, strip_line_endings};
use tracing::debug;
use uuid::Uuid;

use super::{Context, Handler, HandlerError, HandlerResult, channel_list};
use crate::scheduler::OutboundMessage;

/// Tag carrying the id of the message being replied to.
pub const REPLY_TAG: &str = "reply-parent-msg-id";

/// Handler for PRIVMSG command.
///
/// `@reply-parent-msg-id=<uuid> PRIVMSG #<channel> :<text>` queues a reply;
/// without the tag, or with a value that is not a UUID, it queues a plain send.
pub struct PrivmsgHandler;

#[async_trait]
impl Handler for PrivmsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let [target, text] = msg.params.as_slice() else {
            return Err(HandlerError::MalformedCommand(msg.to_string()));
        };
        let Some(channel) = channel_list(&strip_line_endings(target)).into_iter().next() else {
            return Err(HandlerError::MalformedCommand(msg.to_string()));
        };

        let text = strip_line_endings(text);
        if text.is_empty() {
            debug!(channel = %channel, "Ignoring empty PRIVMSG");
            return Ok(());
        }

        let reply_to = msg
            .tag_value(REPLY_TAG)
            .filter(|id| Uuid::parse_str(id).is_ok());
        let outbound = match reply_to {
            Some(parent) => OutboundMessage::reply(channel, parent, text),
            None => OutboundMessage::say(channel, text),
        };

        let receipt = ctx.relay.scheduler().enqueue(outbound);
        debug!(
            client = ctx.id,
            catch_all = receipt.catch_all,
            outcome = ?receipt.outcome,
            "Message queued"
        );
        Ok(())
    }
}
