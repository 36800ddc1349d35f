//! JOIN and PART handlers.

use async_trait::async_trait;
use tmi_proto::Message;
use tracing::{debug, info, warn};

use super::{Context, Handler, HandlerError, HandlerResult, channel_list};
use crate::error::SchedulerError;
use crate::scheduler::PrivilegeLevel;

fn echo(ctx: &Context<'_>, command: &str, channel: &str) -> Message {
    Message::new(command, [format!("#{channel}")]).with_prefix(ctx.own_prefix())
}

/// Handler for JOIN command.
pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        // JOIN #<channel>[,#<channel>...]
        let list = msg
            .param(0)
            .ok_or_else(|| HandlerError::MalformedCommand(msg.to_string()))?;

        for channel in channel_list(list) {
            let level = match ctx.relay.db().channels().find_level(&channel).await {
                Ok(level) => level.unwrap_or_default(),
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Failed to look up stored level");
                    PrivilegeLevel::default()
                }
            };

            if let Err(e) = ctx.relay.upstream().join(&channel).await {
                warn!(channel = %channel, error = %e, code = e.error_code(), "Upstream join failed");
            }
            if ctx.relay.scheduler().add_channel(&channel, level) {
                info!(channel = %channel, level = %level, client = ctx.id, addr = %ctx.addr, "Channel joined");
            }

            let confirmation = echo(ctx, "JOIN", &channel);
            ctx.reply(confirmation).await?;
        }
        Ok(())
    }
}

/// Handler for PART command.
pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let list = msg
            .param(0)
            .ok_or_else(|| HandlerError::MalformedCommand(msg.to_string()))?;

        for channel in channel_list(list) {
            match ctx.relay.scheduler().remove_channel(&channel) {
                Ok(()) => info!(channel = %channel, client = ctx.id, "Channel departed"),
                Err(e @ SchedulerError::ChannelNotFound(_)) => debug!(error = %e, "PART for untracked channel"),
            }
            if let Err(e) = ctx.relay.upstream().depart(&channel).await {
                warn!(channel = %channel, error = %e, code = e.error_code(), "Upstream depart failed");
            }

            let confirmation = echo(ctx, "PART", &channel);
            ctx.reply(confirmation).await?;
        }
        Ok(())
    }
}
