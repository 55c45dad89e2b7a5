//! Registry bundled with its request buffers.
//!
//! Transports hand text to a [`Device`] and get back a [`Reply`]. The token
//! and response buffers are allocated once and reused for every request.

use crate::handler;
use crate::registry::Registry;
use devobj_protocol::{ResponseWriter, Status, Token, MIN_RESPONSE_BUFFER_LEN};

/// Outcome of one request or publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    /// Rendered response. For publications that failed this is the partial
    /// message and must not be transmitted.
    pub text: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

pub struct Device<'a> {
    registry: Registry<'a>,
    tokens: Vec<Token>,
    buffer: Vec<u8>,
    verbose: bool,
}

impl<'a> Device<'a> {
    /// Creates a device with room for `max_tokens` request tokens and a
    /// `response_len` byte response. The response buffer is never smaller
    /// than [`MIN_RESPONSE_BUFFER_LEN`].
    pub fn new(registry: Registry<'a>, response_len: usize, max_tokens: usize) -> Self {
        Self {
            registry,
            tokens: vec![Token::EMPTY; max_tokens.max(1)],
            buffer: vec![0; response_len.max(MIN_RESPONSE_BUFFER_LEN)],
            verbose: true,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn registry(&self) -> &Registry<'a> {
        &self.registry
    }

    pub fn response_capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn token_capacity(&self) -> usize {
        self.tokens.len()
    }

    /// Handles one `!<function> <json>` request.
    pub fn process(&mut self, text: &str) -> Reply {
        let mut resp = ResponseWriter::new(&mut self.buffer).with_verbose(self.verbose);
        let status = handler::process(text, &self.registry, &mut self.tokens, &mut resp);
        Reply {
            status,
            text: resp.as_str().to_string(),
        }
    }

    /// Renders a publication message for `ids`.
    pub fn publish(&mut self, ids: &[u16]) -> Reply {
        let mut resp = ResponseWriter::new(&mut self.buffer).with_verbose(self.verbose);
        let status = handler::publish(ids, &mut resp, &self.registry);
        Reply {
            status,
            text: resp.as_str().to_string(),
        }
    }
}
