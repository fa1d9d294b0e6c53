//! Error types for the tally registry.

use std::path::PathBuf;

use thiserror::Error;

/// The error type for all tally operations.
///
/// Every store operation returns one of these as a typed failure. The
/// request layer maps them to transport-level outcomes through
/// [`TallyError::kind`].
#[derive(Error, Debug)]
pub enum TallyError {
    /// The name was empty, or the sample set was empty or non-finite.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Why the input was rejected.
        reason: String,
    },

    /// An entry with this name is already stored.
    #[error("entry '{name}' already exists")]
    DuplicateKey {
        /// The conflicting name.
        name: String,
    },

    /// No entry with this name is stored.
    #[error("entry '{name}' does not exist")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// Writing the table snapshot to the backing file failed.
    ///
    /// The in-memory table already reflects the mutation when this is
    /// returned; the backing file still holds the previous snapshot.
    #[error("failed to persist table to '{}': {source}", path.display())]
    Persistence {
        /// The backing file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but its content cannot be decoded.
    #[error("backing file '{}' is corrupted: {reason}", path.display())]
    CorruptState {
        /// The backing file path.
        path: PathBuf,
        /// Description of what was invalid.
        reason: String,
    },

    /// The backing file or its directory could not be created or read.
    #[error("failed to access backing file '{}': {source}", path.display())]
    StorageAccess {
        /// The path that could not be accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Payload-free classification of a [`TallyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`TallyError::InvalidInput`].
    InvalidInput,
    /// See [`TallyError::DuplicateKey`].
    DuplicateKey,
    /// See [`TallyError::NotFound`].
    NotFound,
    /// See [`TallyError::Persistence`].
    Persistence,
    /// See [`TallyError::CorruptState`].
    CorruptState,
    /// See [`TallyError::StorageAccess`].
    StorageAccess,
}

impl TallyError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::CorruptState { .. } => ErrorKind::CorruptState,
            Self::StorageAccess { .. } => ErrorKind::StorageAccess,
        }
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// Type alias for `Result<T, TallyError>`.
pub type Result<T> = std::result::Result<T, TallyError>;
