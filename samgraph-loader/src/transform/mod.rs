//! Row-to-mutation transformers.
//!
//! One pure function per entity kind turns a CSV row into the edges and
//! upsert lookups it contributes. Transformers never touch the store; the
//! batcher merges their output and the commit pool does the rest.

mod acq_rights;
mod applications;
mod facets;
mod instances;
mod product_equipments;
mod products;

use std::collections::BTreeMap;

use samgraph_core::NQuad;

use crate::xid::{ResolveMode, Resolved};

pub use facets::updated_created_facets;

/// Shared, read-only context for one file pass.
#[derive(Clone)]
pub struct TransformCtx {
    pub mode: ResolveMode,
}

/// Edges and lookups contributed by a single row.
#[derive(Debug)]
pub struct RowNquads {
    pub nquads: Vec<NQuad>,
    /// Upsert fragments keyed by variable name; keying deduplicates repeated
    /// XIDs within a batch
    pub upserts: BTreeMap<String, String>,
    /// Reference to the row's primary node
    pub subject: String,
    /// Whether the reader attaches the per-scope edge to the subject. Link
    /// rows clear this so they do not restate the product's scope.
    pub scope_edge: bool,
}

impl Default for RowNquads {
    fn default() -> Self {
        RowNquads {
            nquads: Vec::new(),
            upserts: BTreeMap::new(),
            subject: String::new(),
            scope_edge: true,
        }
    }
}

impl RowNquads {
    /// Absorb a resolver result, returning the node reference.
    pub fn push_resolved(&mut self, r: Resolved) -> String {
        self.nquads.extend(r.nquads);
        if let Some((var, fragment)) = r.upsert {
            self.upserts.insert(var, fragment);
        }
        r.uid
    }
}

/// Transformer signature shared by every static entity kind.
pub type TransformFn = fn(&TransformCtx, &[String], &[String], usize) -> RowNquads;

/// The fixed entity files loaded by the static stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Products,
    Applications,
    Instances,
    AcquiredRights,
    ProductEquipments,
}

impl EntityKind {
    /// Stage label used in logs and error aggregation.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Products => "products",
            EntityKind::Applications => "applications",
            EntityKind::Instances => "instances",
            EntityKind::AcquiredRights => "acquired rights",
            EntityKind::ProductEquipments => "product equipments",
        }
    }

    /// Header column holding the external identifier.
    pub fn xid_column(&self) -> &'static str {
        match self {
            EntityKind::Products | EntityKind::ProductEquipments => "SWIDTag",
            EntityKind::Applications => "IdApplication",
            EntityKind::Instances => "IdInstance",
            EntityKind::AcquiredRights => "SKU",
        }
    }

    pub fn transform_fn(&self) -> TransformFn {
        match self {
            EntityKind::Products => products::transform,
            EntityKind::Applications => applications::transform,
            EntityKind::Instances => instances::transform,
            EntityKind::AcquiredRights => acq_rights::transform,
            EntityKind::ProductEquipments => product_equipments::transform,
        }
    }
}

impl TransformCtx {
    pub fn new(mode: ResolveMode) -> Self {
        Self { mode }
    }
}
