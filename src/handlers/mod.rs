//! Client command handlers.
//!
//! Local clients speak a small subset of the Twitch IRC dialect. Each
//! recognized command has a [`Handler`]; the [`Registry`] maps command
//! names to handlers and dispatches one parsed line at a time.

mod channel;
mod connection;
mod messaging;

pub use channel::{JoinHandler, PartHandler};
pub use connection::{CapHandler, NickHandler, PingHandler};
pub use messaging::PrivmsgHandler;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tmi_proto::{Message, Prefix};
use tokio::sync::mpsc;
use tracing::debug;

pub use crate::error::{HandlerError, HandlerResult};
use crate::metrics;
use crate::network::ConnectionId;
use crate::relay::Relay;

/// Host name the relay answers as.
pub const SERVER_NAME: &str = "tmi.twitch.tv";

static CHANNEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?\w+$").expect("channel pattern compiles"));

/// Handler context passed to each command handler.
pub struct Context<'a> {
    pub relay: &'a Relay,
    /// Outbound queue of the connection that sent the line.
    pub sender: &'a mpsc::Sender<String>,
    pub id: ConnectionId,
    pub addr: SocketAddr,
}

impl Context<'_> {
    /// Queue a line for this client only.
    pub async fn reply(&self, msg: Message) -> HandlerResult {
        self.sender.send(msg.to_string()).await?;
        Ok(())
    }

    /// `:<login>!<login>@<login>.tmi.twitch.tv`, the prefix of the relay's own account.
    pub fn own_prefix(&self) -> Prefix {
        Prefix::twitch_user(self.relay.own_login())
    }
}

/// A numeric or command reply from the relay's server name.
pub fn server_reply<I, S>(command: &str, params: I) -> Message
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Message::new(command, params).with_prefix(Prefix::ServerName(SERVER_NAME.to_owned()))
}

/// Split a comma-separated channel list into normalized names.
///
/// Entries that are not a single word (optionally `#`-prefixed) are skipped.
pub fn channel_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| {
            let valid = CHANNEL_PATTERN.is_match(entry);
            if !valid && !entry.is_empty() {
                debug!(entry = %entry, "Skipping invalid channel name");
            }
            valid
        })
        .map(crate::scheduler::normalize_channel)
        .collect()
}

/// Trait implemented by all command handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult;
}

/// Registry of command handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        handlers.insert("NICK", Box::new(NickHandler));
        handlers.insert("CAP", Box::new(CapHandler));
        handlers.insert("PING", Box::new(PingHandler));

        handlers.insert("JOIN", Box::new(JoinHandler));
        handlers.insert("PART", Box::new(PartHandler));

        handlers.insert("PRIVMSG", Box::new(PrivmsgHandler));

        Self { handlers }
    }

    /// Parse one line and run its handler.
    ///
    /// Command names are matched case-sensitively.
    pub async fn dispatch(&self, ctx: &mut Context<'_>, line: &str) -> HandlerResult {
        let msg: Message = line
            .parse()
            .map_err(|_| HandlerError::MalformedCommand(line.to_owned()))?;

        let Some(handler) = self.handlers.get(msg.command.as_str()) else {
            return Err(HandlerError::UnknownCommand(msg.command));
        };

        metrics::record_command(&msg.command);
        let result = handler.handle(ctx, &msg).await;
        if let Err(e) = &result {
            metrics::record_command_error(&msg.command, e.error_code());
        }
        result
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
