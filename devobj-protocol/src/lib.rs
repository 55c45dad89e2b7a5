//! # devobj-protocol
//!
//! Wire-level building blocks for the devobj text protocol.
//!
//! This crate provides:
//! - Stable status codes and status line rendering/parsing
//! - A non-allocating JSON tokenizer producing offset-bounded tokens
//! - A fixed-capacity response writer where every append is capacity-checked
//! - Newline framing for stream transports

pub mod codec;
pub mod error;
pub mod status;
pub mod token;
pub mod writer;

pub use codec::{encode_line, LineDecoder};
pub use error::{Overflow, ProtocolError, TokenizeError};
pub use status::{parse_status_line, Status};
pub use token::{tokenize, Request, Token, TokenKind};
pub use writer::{ResponseWriter, SEPARATOR};

/// Default port for the devobj server.
pub const DEFAULT_PORT: u16 = 7402;

/// Default response buffer capacity in bytes.
pub const DEFAULT_RESPONSE_BUFFER_LEN: usize = 512;

/// Smallest response buffer that still holds every verbose status line.
pub const MIN_RESPONSE_BUFFER_LEN: usize = 64;

/// Default number of tokens a single request may produce.
pub const DEFAULT_MAX_TOKENS: usize = 50;

/// Prefix of spontaneously emitted publication messages.
pub const PUBLICATION_PREFIX: &str = "# ";
