//! Duplicate-send evasion.
//!
//! Chat servers drop a message identical to the previous one from the same
//! sender. Toggling an invisible marker on repeats keeps them distinct.

use dashmap::DashMap;

/// Last payload actually sent, per channel.
pub struct DuplicateGuard {
    marker: char,
    last_sent: DashMap<String, String>,
}

impl DuplicateGuard {
    pub fn new(marker: char) -> Self {
        Self {
            marker,
            last_sent: DashMap::new(),
        }
    }

    /// The payload to send for `text`, recorded as the channel's last send.
    ///
    /// When `text` equals the last payload the marker is stripped if present
    /// and appended otherwise.
    pub fn prepare(&self, channel: &str, text: &str) -> String {
        let mut last = self.last_sent.entry(channel.to_owned()).or_default();
        let payload = if *last == text {
            if text.contains(self.marker) {
                text.replacen(self.marker, "", 1)
            } else {
                let mut marked = String::with_capacity(text.len() + self.marker.len_utf8());
                marked.push_str(text);
                marked.push(self.marker);
                marked
            }
        } else {
            text.to_owned()
        };
        last.clone_from(&payload);
        payload
    }

    pub fn last_sent(&self, channel: &str) -> Option<String> {
        self.last_sent.get(channel).map(|v| v.value().clone())
    }
}
