//! Error taxonomy shared by the table, the string-key layer and the C ABI.

use std::collections::TryReserveError;

/// Coarse classification of a [`TableError`], one per status family.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Caller contract violation. No state was mutated.
    InvalidArgument,
    /// Memory could not be reserved. The table is unchanged.
    Alloc,
    /// Insert found a live entry with the same key.
    DuplicateKey,
    /// Lookup or removal of an absent key.
    NotFound,
    /// Structural precondition violated.
    Misuse,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
    #[error("key already present")]
    DuplicateKey,
    #[error("key not found")]
    NotFound,
    #[error("misuse: {0}")]
    Misuse(&'static str),
}

impl TableError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TableError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TableError::Alloc(_) => ErrorKind::Alloc,
            TableError::DuplicateKey => ErrorKind::DuplicateKey,
            TableError::NotFound => ErrorKind::NotFound,
            TableError::Misuse(_) => ErrorKind::Misuse,
        }
    }
}
