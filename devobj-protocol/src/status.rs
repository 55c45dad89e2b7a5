//! Protocol status codes.
//!
//! Every request produces exactly one status. It is rendered at the start of
//! the response as `:<code> <Message>.` (or `:<code>.` when verbose messages
//! are off), optionally followed by a payload.

use crate::error::ProtocolError;
use std::fmt;

/// Outcome of a request.
///
/// The numeric codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Success = 0,
    UnknownFunction = 31,
    UnknownObject = 32,
    WrongFormat = 33,
    WrongType = 34,
    DeviceBusy = 35,
    Unauthorized = 36,
    RequestTooLong = 37,
    ResponseTooLong = 38,
    InvalidValue = 39,
}

impl Status {
    pub const ALL: [Status; 10] = [
        Status::Success,
        Status::UnknownFunction,
        Status::UnknownObject,
        Status::WrongFormat,
        Status::WrongType,
        Status::DeviceBusy,
        Status::Unauthorized,
        Status::RequestTooLong,
        Status::ResponseTooLong,
        Status::InvalidValue,
    ];

    /// Numeric wire code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Human-readable phrase used in verbose status lines.
    pub fn message(self) -> &'static str {
        match self {
            Status::Success => "Success",
            Status::UnknownFunction => "Unknown function",
            Status::UnknownObject => "Data object not found",
            Status::WrongFormat => "Wrong format",
            Status::WrongType => "Data type not supported",
            Status::DeviceBusy => "Device busy",
            Status::Unauthorized => "Unauthorized",
            Status::RequestTooLong => "Request too long",
            Status::ResponseTooLong => "Response too long",
            Status::InvalidValue => "Invalid or too large value",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }
}

impl TryFrom<u8> for Status {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(ProtocolError::UnknownStatus(code))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// Splits a response line into its status and the payload that follows it.
///
/// Accepts both verbose (`:0 Success. [1, 2]`) and terse (`:0. [1, 2]`)
/// status lines. The payload is returned with leading whitespace removed.
pub fn parse_status_line(line: &str) -> Result<(Status, &str), ProtocolError> {
    let malformed = || ProtocolError::MalformedStatusLine(line.to_string());

    let rest = line.strip_prefix(':').ok_or_else(malformed)?;
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return Err(malformed());
    }
    let code: u8 = rest[..digits_end].parse().map_err(|_| malformed())?;
    let status = Status::try_from(code)?;

    // The phrase never contains a dot, so the first one ends the status line.
    let after_code = &rest[digits_end..];
    let dot = after_code.find('.').ok_or_else(malformed)?;
    Ok((status, after_code[dot + 1..].trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::UnknownFunction.code(), 31);
        assert_eq!(Status::UnknownObject.code(), 32);
        assert_eq!(Status::WrongFormat.code(), 33);
        assert_eq!(Status::WrongType.code(), 34);
        assert_eq!(Status::DeviceBusy.code(), 35);
        assert_eq!(Status::Unauthorized.code(), 36);
        assert_eq!(Status::RequestTooLong.code(), 37);
        assert_eq!(Status::ResponseTooLong.code(), 38);
        assert_eq!(Status::InvalidValue.code(), 39);
    }

    #[test]
    fn test_from_code() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(1), None);
        assert!(matches!(
            Status::try_from(40),
            Err(ProtocolError::UnknownStatus(40))
        ));
    }

    #[test]
    fn test_is_success() {
        assert!(Status::Success.is_success());
        assert!(!Status::WrongFormat.is_success());
    }

    #[test]
    fn test_parse_verbose_line() {
        let (status, payload) = parse_status_line(":0 Success. [1, 2.50]").unwrap();
        assert_eq!(status, Status::Success);
        assert_eq!(payload, "[1, 2.50]");

        let (status, payload) = parse_status_line(":32 Data object not found.").unwrap();
        assert_eq!(status, Status::UnknownObject);
        assert_eq!(payload, "");
    }

    #[test]
    fn test_parse_terse_line() {
        let (status, payload) = parse_status_line(":0. 42").unwrap();
        assert_eq!(status, Status::Success);
        assert_eq!(payload, "42");

        let (status, _) = parse_status_line(":38.").unwrap();
        assert_eq!(status, Status::ResponseTooLong);
    }

    #[test]
    fn test_parse_malformed_lines() {
        assert!(matches!(
            parse_status_line("0 Success."),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
        assert!(matches!(
            parse_status_line(": Success."),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
        assert!(matches!(
            parse_status_line(":0 Success"),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
        assert!(matches!(
            parse_status_line(":7."),
            Err(ProtocolError::UnknownStatus(7))
        ));
        assert!(matches!(
            parse_status_line(":999."),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
    }
}
