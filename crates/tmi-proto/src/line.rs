//! Newline framed lines for `tokio_util::codec`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};

/// Twitch tags easily exceed the classic 512 byte limit.
pub const DEFAULT_MAX_LEN: usize = 8191;

/// Reads LF (or CRLF) terminated lines and writes CRLF terminated ones.
///
/// Decoded lines have their terminator removed. A line that is too long or
/// not UTF-8 is reported once as an error and dropped; decoding resumes at
/// the next line.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Where the next newline search starts.
    next_index: usize,
    max_len: usize,
    /// Dropping the tail of an overlong line until its newline arrives.
    discarding: bool,
}

impl LineCodec {
    /// Codec with [`DEFAULT_MAX_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LEN)
    }

    /// Codec with a custom maximum line length, terminator included.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if self.discarding {
            let Some(offset) = src.iter().position(|b| *b == b'\n') else {
                src.clear();
                return Ok(None);
            };
            let _ = src.split_to(offset + 1);
            self.discarding = false;
        }

        let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
            if src.len() > self.max_len {
                let actual = src.len();
                src.clear();
                self.next_index = 0;
                self.discarding = true;
                return Err(ProtocolError::MessageTooLong {
                    actual,
                    limit: self.max_len,
                });
            }
            self.next_index = src.len();
            return Ok(None);
        };

        let line = src.split_to(self.next_index + offset + 1);
        self.next_index = 0;

        if line.len() > self.max_len {
            return Err(ProtocolError::MessageTooLong {
                actual: line.len(),
                limit: self.max_len,
            });
        }

        let mut data = String::from_utf8(line.to_vec()).map_err(|e| ProtocolError::InvalidUtf8 {
            byte_pos: e.utf8_error().valid_up_to(),
        })?;
        let trimmed = data.trim_end_matches(['\r', '\n']).len();
        data.truncate(trimmed);
        Ok(Some(data))
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        if !line.ends_with('\n') {
            dst.extend_from_slice(b"\r\n");
        }
        Ok(())
    }
}

/// Output of [`TolerantLineCodec`].
#[derive(Debug)]
pub enum Frame {
    /// A complete line, terminator removed.
    Line(String),
    /// A line that was dropped, and why.
    Skipped(ProtocolError),
}

/// [`LineCodec`] for peers whose bad lines should be skipped, not fatal.
///
/// `FramedRead` ends the stream after any decoder error, so recoverable
/// failures are yielded as [`Frame::Skipped`] instead. Only I/O errors
/// surface as `Err`.
#[derive(Debug, Clone, Default)]
pub struct TolerantLineCodec {
    inner: LineCodec,
}

impl TolerantLineCodec {
    /// Codec with a custom maximum line length, terminator included.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            inner: LineCodec::with_max_len(max_len),
        }
    }
}

impl Decoder for TolerantLineCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.inner.decode(src) {
            Ok(line) => Ok(line.map(Frame::Line)),
            Err(e) if e.is_recoverable() => Ok(Some(Frame::Skipped(e))),
            Err(e) => Err(e),
        }
    }
}

impl Encoder<String> for TolerantLineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<()> {
        self.inner.encode(line, dst)
    }
}
