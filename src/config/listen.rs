//! Local proxy listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// Where local IRC clients connect.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (default "0.0.0.0:6667").
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    /// Lines buffered per client before it is considered stuck and dropped.
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
    /// Longest accepted client line in bytes, terminator included.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 6667))
}

fn default_send_queue() -> usize {
    512
}

fn default_max_line_len() -> usize {
    tmi_proto::line::DEFAULT_MAX_LEN
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            send_queue: default_send_queue(),
            max_line_len: default_max_line_len(),
        }
    }
}
