//! IRCv3 message tags.

use std::fmt::{self, Write};

/// A single `key[=value]` message tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag(pub String, pub Option<String>);

impl Tag {
    /// Build a tag with a value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag(key.into(), Some(value.into()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)?;
        if let Some(value) = &self.1 {
            f.write_char('=')?;
            escape_tag_value(f, value)?;
        }
        Ok(())
    }
}

/// Split a raw tag section (without the `@`) into unescaped tags.
pub fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(';')
        .filter(|t| !t.is_empty())
        .map(|t| match t.split_once('=') {
            Some((key, value)) => Tag(key.to_owned(), Some(unescape_tag_value(value))),
            None => Tag(t.to_owned(), None),
        })
        .collect()
}

/// Escape a tag value for the wire.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> fmt::Result {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Reverse [`escape_tag_value`]. A dangling backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_twitch_system_msg() {
        assert_eq!(
            unescape_tag_value("5\\sraiders\\sfrom\\sTestChannel"),
            "5 raiders from TestChannel"
        );
        assert_eq!(unescape_tag_value("a\\:b\\\\c\\"), "a;b\\c");
    }

    #[test]
    fn escapes_on_display() {
        let tag = Tag::new("display-name", "a b;c");
        assert_eq!(tag.to_string(), "display-name=a\\sb\\:c");
        assert_eq!(Tag("flag".into(), None).to_string(), "flag");
    }

    #[test]
    fn splits_valueless_and_empty_tags() {
        let tags = parse_tags("mod=1;;subscriber;emotes=");
        assert_eq!(
            tags,
            vec![
                Tag::new("mod", "1"),
                Tag("subscriber".into(), None),
                Tag::new("emotes", ""),
            ]
        );
    }
}
