//! Error types for samgraph-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A literal could not be converted to its declared data type
    #[error("conversion error: data: {data}, error: {reason}")]
    Conversion { data: String, reason: String },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a conversion error
    pub fn conversion(data: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Conversion {
            data: data.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
