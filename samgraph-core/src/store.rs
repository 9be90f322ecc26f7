//! The graph-store protocol consumed by the loader.
//!
//! The target store is treated as a black-box transactional service: each
//! [`MutationRequest`] is committed immediately and independently, and a
//! failed commit is either a retryable transaction conflict or fatal.

use async_trait::async_trait;
use thiserror::Error;

use crate::nquad::MutationRequest;

/// Errors surfaced by a [`GraphStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transient transaction conflict; the same request may be retried
    #[error("transaction aborted: {0}")]
    Conflict(String),

    /// The request itself is malformed; retrying cannot succeed
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),

    /// Schema operation failed
    #[error("schema error: {0}")]
    Schema(String),

    /// Transport / availability failure
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether this error is the retryable conflict class.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of a committed mutation.
#[derive(Debug, Clone, Default)]
pub struct MutateStats {
    /// Edges applied by this commit
    pub edges: usize,
    /// Nodes newly created (as opposed to bound by upsert lookup)
    pub created_nodes: usize,
}

/// Black-box transactional graph store.
///
/// `mutate` applies one request atomically: either every edge in the batch
/// becomes visible or none does. Conflicts are reported as
/// [`StoreError::Conflict`] and are safe to retry with the same request.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Commit one mutation request immediately and independently.
    async fn mutate(&self, req: &MutationRequest) -> StoreResult<MutateStats>;

    /// Apply a schema declaration.
    async fn alter_schema(&self, schema: &str) -> StoreResult<()>;

    /// Drop the schema and all data.
    async fn drop_all(&self) -> StoreResult<()>;
}
