//! Owned IRC message.

use std::fmt;
use std::str::FromStr;

use crate::badges::Badges;
use crate::error::ProtocolError;
use crate::parser::ParsedMessage;
use crate::prefix::Prefix;
use crate::tags::{parse_tags, Tag};

/// An IRC line split into its parts.
///
/// `Display` writes the wire form including the trailing CRLF. The last
/// parameter is written as a trailing (`:`-prefixed) parameter whenever the
/// message has more than one parameter or the value would otherwise be
/// ambiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// IRCv3 tags, if any were present.
    pub tags: Option<Vec<Tag>>,
    /// Source of the message.
    pub prefix: Option<Prefix>,
    /// Command word or three digit numeric, as sent.
    pub command: String,
    /// Parameters, the trailing one included.
    pub params: Vec<String>,
}

impl Message {
    /// A message with no tags or prefix.
    pub fn new<I, S>(command: &str, params: I) -> Message
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Message {
            tags: None,
            prefix: None,
            command: command.to_owned(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// `PRIVMSG #<channel> :<text>`
    pub fn privmsg(channel: &str, text: &str) -> Message {
        Message::new("PRIVMSG", [format!("#{channel}"), text.to_owned()])
    }

    /// Builder: set the prefix.
    pub fn with_prefix(mut self, prefix: Prefix) -> Message {
        self.prefix = Some(prefix);
        self
    }

    /// Builder: append a tag.
    pub fn with_tag(mut self, key: &str, value: &str) -> Message {
        self.tags
            .get_or_insert_with(Vec::new)
            .push(Tag::new(key, value));
        self
    }

    /// Value of a tag, `None` when absent or valueless.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|Tag(k, _)| k == key)
            .and_then(|Tag(_, v)| v.as_deref())
    }

    /// Parsed `badges` tag (empty when absent).
    pub fn badges(&self) -> Badges {
        self.tag_value("badges").map(Badges::parse).unwrap_or_default()
    }

    /// Nickname from a user prefix.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref()?.nickname()
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// The first `#channel` parameter without its `#`.
    pub fn channel(&self) -> Option<&str> {
        self.params.iter().find_map(|p| p.strip_prefix('#'))
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = ParsedMessage::parse(s).map_err(|cause| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        })?;

        Ok(Message {
            tags: parsed.tags.map(parse_tags),
            prefix: parsed.prefix.map(Prefix::new_from_str),
            command: parsed.command.to_owned(),
            params: parsed.params.iter().map(|p| (*p).to_owned()).collect(),
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            f.write_str("@")?;
            for (i, tag) in tags.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                write!(f, "{tag}")?;
            }
            f.write_str(" ")?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {param}")?;
            }
            let needs_colon = !middle.is_empty()
                || last.is_empty()
                || last.contains(' ')
                || last.starts_with(':');
            if needs_colon {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        f.write_str("\r\n")
    }
}
