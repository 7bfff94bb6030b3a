use thiserror::Error;
use uuid::Uuid;

/// Convenient result alias for the modgate library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No item of the given kind exists with this id.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    /// An item with the same id already exists.
    #[error("{kind} {id} already exists")]
    Conflict { kind: &'static str, id: Uuid },

    /// Raised when an update carries no field to change.
    #[error("update for {kind} {id} contains no changes")]
    EmptyUpdate { kind: &'static str, id: Uuid },

    /// Raised when the backing store is unusable (e.g. a poisoned lock).
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl Error {
    /// Shorthand for a storage failure.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether the error describes a missing item.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
