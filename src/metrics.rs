//! Prometheus metrics.
//!
//! - `relay_messages_enqueued_total` / `relay_messages_dispatched_total`
//! - `relay_messages_dropped_total{policy}` - queue overflow discards
//! - `relay_upstream_events_total{kind}` - events received from the chat server
//! - `relay_privilege_transitions_total{level}` - detected level changes
//! - `relay_client_commands_total{command}` and `relay_command_errors_total{command,error}`
//! - `relay_connected_clients`, `relay_tracked_channels` (gauges)
//! - `relay_broadcast_fanout` - clients reached per upstream line

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

pub static MESSAGES_ENQUEUED: OnceLock<IntCounter> = OnceLock::new();

pub static MESSAGES_DISPATCHED: OnceLock<IntCounter> = OnceLock::new();

/// Messages discarded because a queue was full.
pub static MESSAGES_DROPPED: OnceLock<IntCounterVec> = OnceLock::new();

pub static UPSTREAM_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

pub static UPSTREAM_RECONNECTS: OnceLock<IntCounter> = OnceLock::new();

pub static PRIVILEGE_TRANSITIONS: OnceLock<IntCounterVec> = OnceLock::new();

pub static CLIENT_COMMANDS: OnceLock<IntCounterVec> = OnceLock::new();

pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

pub static TRACKED_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

pub static BROADCAST_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup. Recording before `init` is a no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(MESSAGES_ENQUEUED, IntCounter::new("relay_messages_enqueued_total", "Outbound messages queued"));
    register!(MESSAGES_DISPATCHED, IntCounter::new("relay_messages_dispatched_total", "Outbound messages handed to the upstream session"));
    register!(MESSAGES_DROPPED, IntCounterVec::new(Opts::new("relay_messages_dropped_total", "Outbound messages discarded on queue overflow"), &["policy"]));
    register!(UPSTREAM_EVENTS, IntCounterVec::new(Opts::new("relay_upstream_events_total", "Events received from the chat server"), &["kind"]));
    register!(UPSTREAM_RECONNECTS, IntCounter::new("relay_upstream_reconnects_total", "Upstream session reconnects"));
    register!(PRIVILEGE_TRANSITIONS, IntCounterVec::new(Opts::new("relay_privilege_transitions_total", "Privilege level changes by new level"), &["level"]));
    register!(CLIENT_COMMANDS, IntCounterVec::new(Opts::new("relay_client_commands_total", "Client commands handled"), &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("relay_command_errors_total", "Client command errors"), &["command", "error"]));
    register!(CONNECTED_CLIENTS, IntGauge::new("relay_connected_clients", "Local clients connected"));
    register!(TRACKED_CHANNELS, IntGauge::new("relay_tracked_channels", "Channels with a running schedule"));
    register!(BROADCAST_FANOUT, Histogram::with_opts(
        HistogramOpts::new("relay_broadcast_fanout", "Clients reached per broadcast line")
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[inline]
pub fn inc_enqueued() {
    if let Some(c) = MESSAGES_ENQUEUED.get() {
        c.inc();
    }
}

#[inline]
pub fn inc_dispatched() {
    if let Some(c) = MESSAGES_DISPATCHED.get() {
        c.inc();
    }
}

#[inline]
pub fn inc_dropped(policy: &str) {
    if let Some(c) = MESSAGES_DROPPED.get() {
        c.with_label_values(&[policy]).inc();
    }
}

#[inline]
pub fn inc_upstream_event(kind: &str) {
    if let Some(c) = UPSTREAM_EVENTS.get() {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn inc_upstream_reconnects() {
    if let Some(c) = UPSTREAM_RECONNECTS.get() {
        c.inc();
    }
}

#[inline]
pub fn inc_privilege_transition(level: &str) {
    if let Some(c) = PRIVILEGE_TRANSITIONS.get() {
        c.with_label_values(&[level]).inc();
    }
}

#[inline]
pub fn record_command(command: &str) {
    if let Some(c) = CLIENT_COMMANDS.get() {
        c.with_label_values(&[command]).inc();
    }
}

#[inline]
pub fn record_command_error(command: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[command, error]).inc();
    }
}

#[inline]
pub fn set_connected_clients(count: usize) {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.set(count as i64);
    }
}

#[inline]
pub fn set_tracked_channels(count: usize) {
    if let Some(g) = TRACKED_CHANNELS.get() {
        g.set(count as i64);
    }
}

#[inline]
pub fn record_fanout(recipients: usize) {
    if let Some(h) = BROADCAST_FANOUT.get() {
        h.observe(recipients as f64);
    }
}
