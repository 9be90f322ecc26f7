//! samgraph-core: mutation data model and graph-store protocol.
//!
//! This crate defines the edge/value model shared by every loader stage, the
//! black-box [`GraphStore`] trait the pipeline commits through, an in-memory
//! reference store for tests and dry runs, and the triple rendering used by
//! export mode.

pub mod error;
pub mod memory;
pub mod nquad;
pub mod rdf;
pub mod store;
pub mod value;

pub use error::{Error, Result};
pub use memory::{MemoryStore, StoredEdge, StoredObject};
pub use nquad::{upsert_query, Facet, FacetKind, MutationRequest, NQuad, Object};
pub use store::{GraphStore, MutateStats, StoreError, StoreResult};
pub use value::{DataType, Value};
