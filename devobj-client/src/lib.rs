//! # devobj-client
//!
//! Client library for devobj.
//!
//! This crate provides:
//! - Async TCP connection with newline framing and timeouts
//! - Separation of publication messages from request responses
//! - High-level helpers for `!read`, `!write`, `!list` and `!exec`

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig, Response};
pub use error::ClientError;
