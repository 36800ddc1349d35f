//! Read-only runtime snapshot served by the health endpoint.

use serde::Serialize;

use crate::relay::Relay;

/// Page size assumed when converting `/proc/self/statm` pages to bytes.
const PAGE_SIZE: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Live local client connections.
    pub connections: usize,
    pub tracked_channels: usize,
    /// Messages waiting in every queue, catch-all included.
    pub queued_messages: usize,
    /// Tasks alive on the tokio runtime, when called from inside one.
    pub alive_tasks: Option<usize>,
    /// Resident set size. Only available on Linux.
    pub memory_rss_bytes: Option<u64>,
}

impl StatusSnapshot {
    pub fn collect(relay: &Relay) -> Self {
        Self {
            connections: relay.connections().len(),
            tracked_channels: relay.scheduler().tracked_count(),
            queued_messages: relay.scheduler().queued_total(),
            alive_tasks: tokio::runtime::Handle::try_current()
                .ok()
                .map(|handle| handle.metrics().num_alive_tasks()),
            memory_rss_bytes: resident_memory(),
        }
    }
}

fn resident_memory() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm(&statm)
}

/// Second field of statm is resident pages.
fn parse_statm(statm: &str) -> Option<u64> {
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statm_resident_pages() {
        assert_eq!(parse_statm("5243 1203 800 12 0 900 0\n"), Some(1203 * 4096));
        assert_eq!(parse_statm("5243"), None);
        assert_eq!(parse_statm(""), None);
    }

    #[test]
    fn serializes_with_field_names() {
        let snapshot = StatusSnapshot {
            connections: 2,
            tracked_channels: 1,
            queued_messages: 0,
            alive_tasks: Some(7),
            memory_rss_bytes: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["connections"], 2);
        assert_eq!(json["alive_tasks"], 7);
        assert!(json["memory_rss_bytes"].is_null());
    }
}
