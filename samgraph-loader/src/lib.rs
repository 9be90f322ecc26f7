//! samgraph-loader: versioned CSV snapshots into a graph store.
//!
//! The loader walks per-scope version directories of semicolon-separated
//! inventory files, resolves external identifiers to graph nodes through
//! upsert lookups, batches the resulting edges and commits them through a
//! bounded pool with conflict retry. Load state is persisted between runs so
//! only dirty rows are re-imported.

pub mod equipment;
pub mod error;
pub mod export;
pub mod metadata;
pub mod orchestrator;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod state;
pub mod transform;
pub mod xid;

pub use error::{LoaderError, Result};
pub use orchestrator::{AggregateLoader, LoaderConfig};
pub use pipeline::{AbortCounter, StopSignal, DEFAULT_BATCH_SIZE, DEFAULT_COMMITTERS};
