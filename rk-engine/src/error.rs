//! Error types for rk-engine
//!
//! `StoreError` is what a tag-store collaborator reports; `Error` is what the
//! engine reports to its callers. Subject disappearance is not an error at the
//! commit boundary (it becomes `CommitOutcome::SubjectMissing`), but it is kept
//! as a variant for lookups that genuinely require the subject.

use rk_common::{SubjectId, TagId};
use thiserror::Error;

/// Failure reported by a `TagStore` implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Subject is not (or no longer) part of the collection
    #[error("subject {0} not found")]
    NotFound(SubjectId),

    /// Insufficient grant to write the requested tags
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Live state diverged between fetch and write
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store could not be reached or failed internally
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for rk-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Subject vanished
    #[error("Subject not found: {0}")]
    NotFound(SubjectId),

    /// Insufficient write grant (never retried)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Live state changed underneath a write (last write wins, never retried)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed category declarations
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// Tag store failure other than the above
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Toggle event for a tag the coalescer does not track
    #[error("Tag {0} is not a tracked toggle tag")]
    UntrackedTag(TagId),

    /// Shared-library error (configuration, I/O)
    #[error(transparent)]
    Common(#[from] rk_common::Error),
}

impl Error {
    /// Short kind label used on the operator channel
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Forbidden(_) => "forbidden",
            Error::Conflict(_) => "conflict",
            Error::InvalidHierarchy(_) => "invalid_hierarchy",
            Error::StoreUnavailable(_) => "unavailable",
            Error::UntrackedTag(_) => "untracked_tag",
            Error::Common(_) => "internal",
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(subject) => Error::NotFound(subject),
            StoreError::Forbidden(msg) => Error::Forbidden(msg),
            StoreError::Conflict(msg) => Error::Conflict(msg),
            StoreError::Unavailable(msg) => Error::StoreUnavailable(msg),
        }
    }
}

/// Convenience Result type using rk-engine Error
pub type Result<T> = std::result::Result<T, Error>;
