//! Error taxonomy for the upload pipeline.
//!
//! Fatal errors (configuration, roadmap validation, missing issue types)
//! abort the run before any remote mutation. Per-node creation failures are
//! not represented here — they are isolated in the run report so one bad
//! node never aborts its siblings.

use thiserror::Error;

use crate::transport::{Rejection, TransportError};

/// Errors that abort an upload run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or malformed connection settings. The pipeline never starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The roadmap document is malformed. Every problem found across the
    /// whole tree is reported in one batch.
    #[error("roadmap validation failed:\n{}", .problems.join("\n"))]
    Validation { problems: Vec<String> },

    /// An issue type could not be resolved even after refreshing the
    /// catalog. Carries the names the project does know about.
    #[error("unknown issue type '{name}' (known types: {})", .known.join(", "))]
    UnknownIssueType { name: String, known: Vec<String> },

    /// The roadmap requires an issue type the project does not offer.
    /// Issue types cannot be created through the API, so this is fatal.
    #[error("issue type '{name}' is not available in the project and cannot be auto-created (known types: {})", .known.join(", "))]
    MissingIssueType { name: String, known: Vec<String> },

    /// The HTTP layer failed outright (connection, serialization).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The remote service rejected a request needed to set up the run
    /// (catalog fetch, prerequisite creation).
    #[error("request rejected: {0}")]
    Rejected(Rejection),
}

impl SyncError {
    /// Batch a list of validation problems into a single error.
    ///
    /// Returns `Ok(())` when the list is empty so callers can write
    /// `SyncError::validation(problems)?`.
    pub fn validation(problems: Vec<String>) -> Result<(), SyncError> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Validation { problems })
        }
    }
}
