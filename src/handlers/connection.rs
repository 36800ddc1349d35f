//! Session-level commands: NICK, CAP and PING.
//!
//! Local clients never authenticate against the relay. These handlers only
//! produce the replies a Twitch IRC client waits for before it proceeds.

use async_trait::async_trait;
use tmi_proto::Message;
use tracing::debug;

use super::{Context, Handler, HandlerResult, SERVER_NAME, server_reply};

/// Capabilities acknowledged on every `CAP REQ`.
const CAPABILITIES: &str = "twitch.tv/tags twitch.tv/commands twitch.tv/membership";

const WELCOME_BURST: [(&str, &str); 7] = [
    ("001", "Welcome, GLHF!"),
    ("002", "Your host is tmi.twitch.tv"),
    ("003", "This server is rather new"),
    ("004", "-"),
    ("375", "-"),
    ("372", "You are in a maze of twisty passages, all alike."),
    ("376", ">"),
];

/// Handler for NICK command: answers with the welcome burst.
pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        debug!(client = ctx.id, requested = ?msg.param(0), "Sending welcome burst");
        let login = ctx.relay.own_login();
        for (numeric, text) in WELCOME_BURST {
            ctx.reply(server_reply(numeric, [login, text])).await?;
        }
        Ok(())
    }
}

/// Handler for CAP command. Only `REQ` is answered.
pub struct CapHandler;

#[async_trait]
impl Handler for CapHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if msg.param(0) != Some("REQ") {
            return Ok(());
        }
        ctx.reply(server_reply("CAP", ["*", "ACK", CAPABILITIES]))
            .await
    }
}

/// Handler for PING command.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        // PING :<token>
        let token = msg.trailing().unwrap_or(SERVER_NAME);
        ctx.reply(server_reply("PONG", [SERVER_NAME, token])).await
    }
}
