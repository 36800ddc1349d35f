//! Error types for line framing and message parsing.

use thiserror::Error;

/// Convenience alias for results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors raised while reading, writing or parsing lines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error on the underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A line exceeded the configured maximum length.
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Observed length.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The line was not valid UTF-8.
    #[error("invalid UTF-8 at byte {byte_pos}")]
    InvalidUtf8 {
        /// Offset of the first invalid byte.
        byte_pos: usize,
    },

    /// The line could not be parsed as an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The offending line.
        string: String,
        /// Why it failed.
        #[source]
        cause: MessageParseError,
    },
}

impl ProtocolError {
    /// Whether only the offending line is lost and the stream can keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::MessageTooLong { .. }
                | ProtocolError::InvalidUtf8 { .. }
                | ProtocolError::InvalidMessage { .. }
        )
    }
}

/// Reasons a single line fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Nothing but whitespace.
    #[error("empty message")]
    EmptyMessage,

    /// The command token is neither letters nor a three digit numeric.
    #[error("invalid command")]
    InvalidCommand,

    /// The parser stopped at the given byte offset.
    #[error("parse error at position {position}")]
    ParseContext {
        /// Byte offset into the line.
        position: usize,
    },
}
