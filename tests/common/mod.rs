//! Integration test common infrastructure.
//!
//! Provides a scripted fake Twitch chat server, a spawner for the relay
//! binary pointed at it, and a line-oriented local client.

pub mod client;
pub mod server;
pub mod twitch;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestRelay;
#[allow(unused_imports)]
pub use twitch::FakeTwitch;
