//! Events received from the chat server.

use tmi_proto::{Badges, Message};

/// A received line with the fields the relay cares about pulled out.
#[derive(Debug, Clone)]
pub struct EventLine {
    /// The line exactly as received, without its terminator.
    pub raw: String,
    pub message: Message,
    /// Channel without `#`.
    pub channel: String,
    pub badges: Badges,
    pub display_name: Option<String>,
    /// Login of the user the event is about, when it has one.
    pub login: Option<String>,
}

impl EventLine {
    fn new(raw: &str, message: Message) -> Option<Self> {
        let channel = message.channel()?.to_ascii_lowercase();
        Some(Self {
            raw: raw.to_owned(),
            channel,
            badges: message.badges(),
            display_name: message.tag_value("display-name").map(str::to_owned),
            login: message.source_nickname().map(str::to_ascii_lowercase),
            message,
        })
    }

    /// `mod=1` tag.
    pub fn is_mod_tag(&self) -> bool {
        self.message.tag_value("mod") == Some("1")
    }
}

/// One inbound event kind per variant.
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// Handshake finished (first connect or reconnect).
    Connected,
    PrivateMessage(EventLine),
    Notice(EventLine),
    /// The relay's own account joined a channel.
    SelfJoin(EventLine),
    SelfPart(EventLine),
    UserJoin(EventLine),
    UserPart(EventLine),
    /// The relay's own state in a channel, sent after joins and sends.
    UserState(EventLine),
    /// Server asked us to reconnect.
    Reconnect,
}

impl UpstreamEvent {
    /// Classify a parsed line. Lines the relay does not forward yield `None`.
    pub fn classify(raw: &str, message: Message, own_login: &str) -> Option<UpstreamEvent> {
        let is_self = message
            .source_nickname()
            .is_some_and(|nick| nick.eq_ignore_ascii_case(own_login));

        match message.command.as_str() {
            "RECONNECT" => Some(UpstreamEvent::Reconnect),
            "PRIVMSG" => EventLine::new(raw, message).map(UpstreamEvent::PrivateMessage),
            "NOTICE" => EventLine::new(raw, message).map(UpstreamEvent::Notice),
            "USERSTATE" => EventLine::new(raw, message).map(UpstreamEvent::UserState),
            "JOIN" if is_self => EventLine::new(raw, message).map(UpstreamEvent::SelfJoin),
            "JOIN" => EventLine::new(raw, message).map(UpstreamEvent::UserJoin),
            "PART" if is_self => EventLine::new(raw, message).map(UpstreamEvent::SelfPart),
            "PART" => EventLine::new(raw, message).map(UpstreamEvent::UserPart),
            _ => None,
        }
    }

    /// Label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamEvent::Connected => "connected",
            UpstreamEvent::PrivateMessage(_) => "privmsg",
            UpstreamEvent::Notice(_) => "notice",
            UpstreamEvent::SelfJoin(_) => "self_join",
            UpstreamEvent::SelfPart(_) => "self_part",
            UpstreamEvent::UserJoin(_) => "user_join",
            UpstreamEvent::UserPart(_) => "user_part",
            UpstreamEvent::UserState(_) => "userstate",
            UpstreamEvent::Reconnect => "reconnect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(raw: &str) -> Option<UpstreamEvent> {
        UpstreamEvent::classify(raw, raw.parse().unwrap(), "relaybot")
    }

    #[test]
    fn join_part_split_by_identity() {
        assert!(matches!(
            classify(":relaybot!relaybot@relaybot.tmi.twitch.tv JOIN #forsen"),
            Some(UpstreamEvent::SelfJoin(l)) if l.channel == "forsen"
        ));
        assert!(matches!(
            classify(":someone!someone@someone.tmi.twitch.tv JOIN #forsen"),
            Some(UpstreamEvent::UserJoin(l)) if l.login.as_deref() == Some("someone")
        ));
        assert!(matches!(
            classify(":RelayBot!relaybot@relaybot.tmi.twitch.tv PART #forsen"),
            Some(UpstreamEvent::SelfPart(_))
        ));
    }

    #[test]
    fn userstate_fields() {
        let raw = "@badges=vip/1;display-name=RelayBot;mod=0 :tmi.twitch.tv USERSTATE #Pajlada";
        let Some(UpstreamEvent::UserState(line)) = classify(raw) else {
            panic!("expected USERSTATE");
        };
        assert_eq!(line.raw, raw);
        assert_eq!(line.channel, "pajlada");
        assert!(line.badges.contains("vip"));
        assert!(!line.is_mod_tag());
        assert_eq!(line.display_name.as_deref(), Some("RelayBot"));
        assert_eq!(line.login, None);
    }

    #[test]
    fn ignores_other_commands() {
        assert!(classify(":tmi.twitch.tv 001 relaybot :Welcome, GLHF!").is_none());
        assert!(classify(":tmi.twitch.tv CLEARCHAT #forsen").is_none());
        assert!(matches!(
            classify(":tmi.twitch.tv RECONNECT"),
            Some(UpstreamEvent::Reconnect)
        ));
    }
}
