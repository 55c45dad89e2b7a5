//! Fixed-capacity response writer.
//!
//! Wraps a caller-provided byte buffer. Every append checks capacity before
//! copying, so the buffer can never be overrun, and a failed append leaves the
//! previous contents untouched.

use crate::error::Overflow;
use crate::status::Status;
use std::fmt;

/// Separator written after every serialized value.
pub const SEPARATOR: &str = ", ";

/// Append-only text builder over a fixed-size buffer.
pub struct ResponseWriter<'b> {
    buf: &'b mut [u8],
    pos: usize,
    verbose: bool,
}

impl<'b> ResponseWriter<'b> {
    /// Creates a writer with verbose status messages enabled.
    ///
    /// Buffers shorter than [`crate::MIN_RESPONSE_BUFFER_LEN`] may not have
    /// room for a verbose status line; such lines are dropped rather than
    /// truncated.
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            verbose: true,
        }
    }

    /// Enables or disables the human-readable phrase in status lines.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Written text. Only `&str` data is ever appended, so this is always
    /// valid UTF-8.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.pos = 0;
    }

    /// Shortens the written text to `len` bytes. Has no effect if `len` is
    /// not shorter than the current length.
    pub fn truncate(&mut self, len: usize) {
        if len < self.pos {
            self.pos = len;
        }
    }

    /// Appends `text` if it fits in the remaining capacity.
    pub fn append(&mut self, text: &str) -> Result<(), Overflow> {
        let bytes = text.as_bytes();
        if bytes.len() > self.remaining() {
            return Err(Overflow);
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    /// Appends formatted text. On overflow nothing of it is kept.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), Overflow> {
        let mark = self.pos;
        if fmt::Write::write_fmt(self, args).is_err() {
            self.pos = mark;
            return Err(Overflow);
        }
        Ok(())
    }

    pub fn open_array(&mut self) -> Result<(), Overflow> {
        self.append("[")
    }

    pub fn close_array(&mut self) -> Result<(), Overflow> {
        self.append("]")
    }

    pub fn open_object(&mut self) -> Result<(), Overflow> {
        self.append("{")
    }

    pub fn close_object(&mut self) -> Result<(), Overflow> {
        self.append("}")
    }

    /// Drops a trailing [`SEPARATOR`]. Returns whether one was present.
    pub fn trim_separator(&mut self) -> bool {
        if self.as_bytes().ends_with(SEPARATOR.as_bytes()) {
            self.pos -= SEPARATOR.len();
            true
        } else {
            false
        }
    }

    /// Replaces the whole buffer with the status line for `status`.
    ///
    /// Returns `status` so handlers can `return resp.status(...)`.
    pub fn status(&mut self, status: Status) -> Status {
        self.pos = 0;
        let rendered = if self.verbose {
            self.append_fmt(format_args!(":{} {}.", status.code(), status.message()))
        } else {
            self.append_fmt(format_args!(":{}.", status.code()))
        };
        if rendered.is_err() {
            self.pos = 0;
        }
        status
    }
}

impl fmt::Write for ResponseWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s).map_err(|_| fmt::Error)
    }
}

impl fmt::Debug for ResponseWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("text", &self.as_str())
            .field("capacity", &self.capacity())
            .field("verbose", &self.verbose)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_within_capacity() {
        let mut buf = [0u8; 8];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.append("abc").unwrap();
        resp.append("defgh").unwrap();
        assert_eq!(resp.as_str(), "abcdefgh");
        assert_eq!(resp.remaining(), 0);
    }

    #[test]
    fn test_append_overflow_keeps_contents() {
        let mut buf = [0u8; 4];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.append("ab").unwrap();
        assert_eq!(resp.append("cde"), Err(Overflow));
        assert_eq!(resp.as_str(), "ab");
    }

    #[test]
    fn test_append_fmt_rolls_back() {
        let mut buf = [0u8; 6];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.append("x").unwrap();
        assert_eq!(
            resp.append_fmt(format_args!("{}{}", "abc", "defg")),
            Err(Overflow)
        );
        assert_eq!(resp.as_str(), "x");
        resp.append_fmt(format_args!("{:.2}", 1.5f32)).unwrap();
        assert_eq!(resp.as_str(), "x1.50");
    }

    #[test]
    fn test_trim_separator() {
        let mut buf = [0u8; 16];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.open_array().unwrap();
        resp.append("1, 2, ").unwrap();
        assert!(resp.trim_separator());
        assert!(!resp.trim_separator());
        resp.close_array().unwrap();
        assert_eq!(resp.as_str(), "[1, 2]");
    }

    #[test]
    fn test_truncate() {
        let mut buf = [0u8; 16];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.append("abcdef").unwrap();
        resp.truncate(10);
        assert_eq!(resp.as_str(), "abcdef");
        resp.truncate(2);
        assert_eq!(resp.as_str(), "ab");
    }

    #[test]
    fn test_object_framing() {
        let mut buf = [0u8; 16];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.open_object().unwrap();
        resp.append("\"a\":1, ").unwrap();
        resp.trim_separator();
        resp.close_object().unwrap();
        assert_eq!(resp.as_str(), "{\"a\":1}");
    }

    #[test]
    fn test_status_line_verbose() {
        let mut buf = [0u8; 64];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.append("garbage that gets replaced").unwrap();
        assert_eq!(resp.status(Status::UnknownObject), Status::UnknownObject);
        assert_eq!(resp.as_str(), ":32 Data object not found.");
    }

    #[test]
    fn test_status_line_terse() {
        let mut buf = [0u8; 64];
        let mut resp = ResponseWriter::new(&mut buf).with_verbose(false);
        resp.status(Status::Success);
        assert_eq!(resp.as_str(), ":0.");
        resp.status(Status::InvalidValue);
        assert_eq!(resp.as_str(), ":39.");
    }

    #[test]
    fn test_longest_status_line_fits_minimum_buffer() {
        let mut buf = [0u8; crate::MIN_RESPONSE_BUFFER_LEN];
        let mut resp = ResponseWriter::new(&mut buf);
        for status in Status::ALL {
            resp.status(status);
            assert!(resp.as_str().starts_with(':'));
            assert!(resp.as_str().ends_with('.'));
        }
    }

    #[test]
    fn test_status_line_too_large_is_dropped() {
        let mut buf = [0u8; 4];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.status(Status::ResponseTooLong);
        assert!(resp.is_empty());
    }
}
