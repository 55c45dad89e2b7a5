//! Newline framing for stream transports.
//!
//! Requests, responses and publications are each a single line of text
//! terminated by `\n` (a preceding `\r` is tolerated and stripped).

use crate::error::ProtocolError;
use bytes::{Buf, BytesMut};

/// Encodes a message as a line.
pub fn encode_line(message: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(message.len() + 1);
    bytes.extend_from_slice(message.as_bytes());
    bytes.push(b'\n');
    bytes
}

/// Incremental line decoder with a maximum line length.
pub struct LineDecoder {
    buffer: BytesMut,
    max_line_len: usize,
    /// Set while the remainder of an over-long line is being skipped.
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_line_len.min(8192) + 1),
            max_line_len,
            discarding: false,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next line.
    ///
    /// Returns `Ok(None)` when more data is needed. A line longer than the
    /// limit yields [`ProtocolError::LineTooLong`] once; the rest of it is
    /// dropped and decoding resumes with the following line.
    pub fn decode_line(&mut self) -> Result<Option<String>, ProtocolError> {
        loop {
            let newline = self.buffer.iter().position(|&b| b == b'\n');

            if self.discarding {
                match newline {
                    Some(pos) => {
                        self.buffer.advance(pos + 1);
                        self.discarding = false;
                        continue;
                    }
                    None => {
                        self.buffer.clear();
                        return Ok(None);
                    }
                }
            }

            return match newline {
                Some(pos) if pos > self.max_line_len => {
                    self.buffer.advance(pos + 1);
                    Err(ProtocolError::LineTooLong {
                        len: pos,
                        max: self.max_line_len,
                    })
                }
                Some(pos) => {
                    let line = self.buffer.split_to(pos + 1);
                    let mut line = &line[..pos];
                    if let Some(stripped) = line.strip_suffix(b"\r") {
                        line = stripped;
                    }
                    std::str::from_utf8(line)
                        .map(|s| Some(s.to_string()))
                        .map_err(|_| ProtocolError::InvalidUtf8)
                }
                None if self.buffer.len() > self.max_line_len => {
                    let len = self.buffer.len();
                    self.buffer.clear();
                    self.discarding = true;
                    Err(ProtocolError::LineTooLong {
                        len,
                        max: self.max_line_len,
                    })
                }
                None => Ok(None),
            };
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(8192)
    }
}
