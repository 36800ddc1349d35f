//! Error types shared across the relay.
//!
//! Failures are contained where they happen: a bad client line, a dead
//! socket or a failed upstream send is logged and the rest of the relay
//! keeps running. Only failing to establish the upstream session at
//! startup is fatal.

use thiserror::Error;
use tmi_proto::ProtocolError;
use tokio::sync::mpsc;

// ============================================================================
// Scheduler Errors
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
}

// ============================================================================
// Upstream Errors (the chat server session)
// ============================================================================

/// Errors talking to the upstream chat server.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("upstream handshake timed out")]
    HandshakeTimeout,

    #[error("upstream session closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("tls error: {0}")]
    Tls(String),
}

impl UpstreamError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "upstream_unavailable",
            Self::LoginRejected(_) => "login_rejected",
            Self::HandshakeTimeout => "handshake_timeout",
            Self::Closed => "upstream_closed",
            Self::Io(_) => "io_error",
            Self::Protocol(_) => "protocol_error",
            Self::Tls(_) => "tls_error",
        }
    }
}

impl<T> From<mpsc::error::SendError<T>> for UpstreamError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        UpstreamError::Closed
    }
}

// ============================================================================
// Connection Errors (local clients)
// ============================================================================

/// A local client connection failed. Never propagated past its own task.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

// ============================================================================
// Handler Errors (client command processing)
// ============================================================================

/// Errors from handling one client line.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The line could not be parsed or had no usable arguments.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The connection's outbound queue is gone.
    #[error("connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl HandlerError {
    /// Static label for logs and metrics.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedCommand(_) => "malformed_command",
            Self::UnknownCommand(_) => "unknown_command",
            Self::ConnectionClosed => "connection_closed",
            Self::Upstream(e) => e.error_code(),
            Self::Scheduler(SchedulerError::ChannelNotFound(_)) => "channel_not_found",
        }
    }

    /// Whether the error ends the client connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

impl<T> From<mpsc::error::SendError<T>> for HandlerError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        HandlerError::ConnectionClosed
    }
}

pub type HandlerResult = Result<(), HandlerError>;
