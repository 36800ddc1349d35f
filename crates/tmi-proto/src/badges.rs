//! Twitch `badges` tag.

/// Parsed `name/version` pairs from a `badges` or `badge-info` tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Badges(Vec<(String, String)>);

impl Badges {
    /// Parse `moderator/1,subscriber/12`. Malformed entries keep an empty version.
    pub fn parse(raw: &str) -> Badges {
        Badges(
            raw.split(',')
                .filter(|b| !b.is_empty())
                .map(|b| match b.split_once('/') {
                    Some((name, version)) => (name.to_owned(), version.to_owned()),
                    None => (b.to_owned(), String::new()),
                })
                .collect(),
        )
    }

    /// Whether a badge with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    /// Version of the named badge.
    pub fn version(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Badge names in tag order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    /// True when no badges were present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
