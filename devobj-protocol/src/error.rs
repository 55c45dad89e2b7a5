//! Protocol error types.

use crate::status::Status;
use thiserror::Error;

/// Errors raised while reading protocol text on the client side.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown status code: {0}")]
    UnknownStatus(u8),

    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),

    #[error("line too long: {len} bytes (max {max})")]
    LineTooLong { len: usize, max: usize },

    #[error("invalid UTF-8 in line")]
    InvalidUtf8,
}

/// Errors from the request tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenizeError {
    /// The caller-provided token slice is exhausted.
    #[error("not enough tokens to hold the request")]
    NoMemory,

    /// Unexpected byte, mismatched bracket or bad escape.
    #[error("invalid character at byte {0}")]
    Invalid(usize),

    /// The text ended inside a string or container.
    #[error("request ended unexpectedly")]
    Partial,
}

impl TokenizeError {
    /// Status reported to the peer for this tokenizer failure.
    pub fn status(&self) -> Status {
        match self {
            TokenizeError::NoMemory => Status::RequestTooLong,
            TokenizeError::Invalid(_) | TokenizeError::Partial => Status::WrongFormat,
        }
    }
}

/// The response buffer has no room for an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("response buffer capacity exceeded")]
pub struct Overflow;

impl From<Overflow> for Status {
    fn from(_: Overflow) -> Self {
        Status::ResponseTooLong
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_error_status() {
        assert_eq!(TokenizeError::NoMemory.status(), Status::RequestTooLong);
        assert_eq!(TokenizeError::Invalid(3).status(), Status::WrongFormat);
        assert_eq!(TokenizeError::Partial.status(), Status::WrongFormat);
    }

    #[test]
    fn test_overflow_maps_to_response_too_long() {
        assert_eq!(Status::from(Overflow), Status::ResponseTooLong);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::UnknownStatus(99);
        assert!(err.to_string().contains("99"));

        let err = ProtocolError::LineTooLong { len: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::MalformedStatusLine("x".to_string());
        assert!(err.to_string().contains("malformed"));

        let err = TokenizeError::Invalid(7);
        assert!(err.to_string().contains('7'));
    }
}
