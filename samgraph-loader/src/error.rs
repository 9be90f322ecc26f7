//! Loader error types

use samgraph_core::StoreError;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors raised while loading CSV snapshots into the store.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Filesystem I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// State file (de)serialization error
    #[error("state file error: {0}")]
    State(#[from] serde_json::Error),

    /// Fatal (non-conflict) store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The configured external-identifier column is missing from the header
    #[error("cannot find xid column {column} in {file}")]
    MissingXidColumn { file: String, column: String },

    /// An equipment type has no identifier attribute
    #[error("equipment type {0} has no identifier attribute")]
    NoIdentifierAttribute(String),

    /// A file pass was cut short by the stop signal
    #[error("file processing is not complete")]
    Interrupted,

    /// Run finished with conflict retries still outstanding
    #[error("cannot complete: {count} aborted mutations\n{detail}")]
    Aborted { count: u32, detail: String },

    /// Per-file load failures, joined scope:file:reason per line
    #[error("{0}")]
    Aggregate(String),

    /// Equipment-type registry failure
    #[error("equipment registry error: {0}")]
    Registry(String),
}
