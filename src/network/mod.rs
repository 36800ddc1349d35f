//! Network module.
//!
//! Contains the Gateway (TCP listener), the per-client Connection task and
//! the live connection set used for broadcast.

mod connection;
mod connections;
mod gateway;

pub use connection::Connection;
pub use connections::{ConnectionHandle, ConnectionId, ConnectionSet};
pub use gateway::Gateway;
