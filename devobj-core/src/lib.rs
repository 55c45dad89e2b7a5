//! # devobj-core
//!
//! Protocol core for devobj.
//!
//! This crate provides:
//! - Data object descriptors with borrowed, typed storage
//! - The object registry and category lookup
//! - The value codec (serialize, validate, commit)
//! - Command handlers for read, write, list, exec and publish
//! - [`Device`], a registry bundled with reusable request buffers
//!
//! The core never owns object storage. Values are borrowed from the embedder
//! through `Cell`/`RefCell` references, so a [`Registry`] is neither `Send`
//! nor `Sync`: the embedder serializes every handler call and every
//! out-of-band mutation of object values.

pub mod codec;
pub mod device;
pub mod error;
pub mod handler;
pub mod object;
pub mod registry;

pub use device::{Device, Reply};
pub use error::RegistryError;
pub use handler::{exec, list, process, publish, read, write, Function};
pub use object::{Access, DataObject, ObjectType, Value};
pub use registry::Registry;

pub use devobj_protocol::{Request, ResponseWriter, Status, Token, TokenKind};
