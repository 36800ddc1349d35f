//! # tmi-proto
//!
//! Parsing and serialization of IRC lines as spoken by Twitch chat (TMI),
//! plus a line codec for `tokio_util::codec::Framed`.
//!
//! ```rust
//! use tmi_proto::Message;
//!
//! let raw = "@badges=moderator/1;mod=1 :tmi.twitch.tv USERSTATE #forsen";
//! let msg: Message = raw.parse().expect("valid line");
//!
//! assert_eq!(msg.command, "USERSTATE");
//! assert_eq!(msg.channel(), Some("forsen"));
//! assert!(msg.badges().contains("moderator"));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod badges;
pub mod error;
#[cfg(feature = "tokio")]
pub mod irc;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
mod parser;
pub mod prefix;
pub mod tags;

pub use self::badges::Badges;
pub use self::error::{MessageParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::irc::IrcCodec;
#[cfg(feature = "tokio")]
pub use self::line::{Frame, LineCodec, TolerantLineCodec};
pub use self::message::Message;
pub use self::prefix::Prefix;
pub use self::tags::Tag;

/// Strip CR and LF from a string so it can be embedded in a single line.
pub fn strip_line_endings(s: &str) -> String {
    s.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}
