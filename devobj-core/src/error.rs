//! Core error types.

use thiserror::Error;

/// Errors from registry construction.
///
/// These indicate a broken object table, which is a programming error on the
/// embedder's side rather than something a peer can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate object name: {name}")]
    DuplicateName { name: String },

    #[error("duplicate object id: {id:#06x}")]
    DuplicateId { id: u16 },

    #[error("object {id:#06x} has an empty name")]
    EmptyName { id: u16 },

    #[error("string object '{name}' has zero capacity")]
    ZeroCapacity { name: String },

    #[error("too many categories: {count} (max {max})")]
    TooManyCategories { count: usize, max: usize },

    #[error("duplicate category name: {name}")]
    DuplicateCategory { name: String },
}
