//! Edge (N-Quad) representation and the batch unit handed to committers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::value::Value;

/// Target of an edge: another node reference, or a typed literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Reference to a node (placeholder id or `uid(var)` lookup binding)
    Uid(String),
    /// Typed literal
    Value(Value),
}

/// Kind of an edge-level facet value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    String,
    DateTime,
}

/// Edge-level key/value annotation, carrying create/update provenance on
/// relational edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub key: String,
    pub value: String,
    pub kind: FacetKind,
}

impl Facet {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Facet {
            key: key.into(),
            value: value.into(),
            kind: FacetKind::String,
        }
    }

    pub fn datetime(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Facet {
            key: key.into(),
            value: value.to_rfc3339(),
            kind: FacetKind::DateTime,
        }
    }
}

/// One directed edge of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct NQuad {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
    pub facets: Vec<Facet>,
}

impl NQuad {
    /// Edge carrying a typed literal.
    pub fn value(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        value: Value,
    ) -> Self {
        NQuad {
            subject: subject.into(),
            predicate: predicate.into(),
            object: Object::Value(value),
            facets: Vec::new(),
        }
    }

    /// Edge linking two node references.
    pub fn link(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object_uid: impl Into<String>,
    ) -> Self {
        NQuad {
            subject: subject.into(),
            predicate: predicate.into(),
            object: Object::Uid(object_uid.into()),
            facets: Vec::new(),
        }
    }

    /// Attach facets to this edge.
    pub fn with_facets(mut self, facets: Vec<Facet>) -> Self {
        self.facets = facets;
        self
    }
}

/// One batch unit of work: a set of edges plus the upsert-lookup query that
/// binds `uid(var)` references to existing nodes at commit time.
///
/// A request is created by one producer and consumed exactly once by one
/// committer; the store applies all of its edges atomically or none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationRequest {
    /// Upsert lookup block, `query { ... }`, empty when no lookups are needed
    pub query: String,
    /// Edges to assert
    pub set: Vec<NQuad>,
}

impl MutationRequest {
    pub fn new(upserts: &BTreeMap<String, String>, set: Vec<NQuad>) -> Self {
        MutationRequest {
            query: upsert_query(upserts),
            set,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Join upsert-lookup fragments (keyed by variable name, so each variable is
/// declared once per batch) into a single query block.
pub fn upsert_query(upserts: &BTreeMap<String, String>) -> String {
    if upserts.is_empty() {
        return String::new();
    }
    let mut lines = Vec::with_capacity(upserts.len() + 2);
    lines.push("query {".to_owned());
    for fragment in upserts.values() {
        lines.push(fragment.clone());
    }
    lines.push("}".to_owned());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_query_declares_each_variable_once() {
        let mut upserts = BTreeMap::new();
        upserts.insert(
            "p1".to_owned(),
            r#"p1 as var(func: eq(product.swidtag, "P1"))"#.to_owned(),
        );
        upserts.insert(
            "p1".to_owned(),
            r#"p1 as var(func: eq(product.swidtag, "P1"))"#.to_owned(),
        );
        let q = upsert_query(&upserts);
        assert_eq!(q.matches("p1 as var").count(), 1);
        assert!(q.starts_with("query {"));
        assert!(q.ends_with('}'));
    }

    #[test]
    fn empty_upserts_produce_empty_query() {
        assert_eq!(upsert_query(&BTreeMap::new()), "");
    }
}
