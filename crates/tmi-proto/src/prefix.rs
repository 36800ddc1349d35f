//! Message source prefix.

use std::fmt;

/// The `:source` part of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// A bare server name such as `tmi.twitch.tv`.
    ServerName(String),
    /// `nick[!user][@host]`.
    Nickname(String, String, String),
}

impl Prefix {
    /// Parse leniently: anything without `!` or `@` that contains a dot is a server.
    pub fn new_from_str(s: &str) -> Prefix {
        let (nick_user, host) = match s.split_once('@') {
            Some((left, host)) => (left, host),
            None => (s, ""),
        };
        let (nick, user) = match nick_user.split_once('!') {
            Some((nick, user)) => (nick, user),
            None => (nick_user, ""),
        };

        if user.is_empty() && host.is_empty() && nick.contains('.') {
            Prefix::ServerName(nick.to_owned())
        } else {
            Prefix::Nickname(nick.to_owned(), user.to_owned(), host.to_owned())
        }
    }

    /// The conventional Twitch user prefix `login!login@login.tmi.twitch.tv`.
    pub fn twitch_user(login: &str) -> Prefix {
        Prefix::Nickname(
            login.to_owned(),
            login.to_owned(),
            format!("{login}.tmi.twitch.tv"),
        )
    }

    /// Nickname for user prefixes.
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) => Some(nick),
            Prefix::ServerName(_) => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_vs_user() {
        assert_eq!(
            Prefix::new_from_str("tmi.twitch.tv"),
            Prefix::ServerName("tmi.twitch.tv".into())
        );
        let user = Prefix::new_from_str("bot!bot@bot.tmi.twitch.tv");
        assert_eq!(user, Prefix::twitch_user("bot"));
        assert_eq!(user.nickname(), Some("bot"));
        assert_eq!(user.to_string(), "bot!bot@bot.tmi.twitch.tv");
    }
}
