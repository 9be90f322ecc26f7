//! Entity identity resolution.
//!
//! Every external identifier (XID) resolves to exactly one node reference
//! per run. In upsert mode the reference is a query-bound variable backed by
//! a lookup fragment, so the store binds it to an existing node sharing the
//! (predicate, value) key or allocates a new one at commit time. In export
//! mode the reference is a deterministic blank-node id and a shared set
//! deduplicates assertion edges across files.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use samgraph_core::{NQuad, Value};

/// Predicate asserting the logical node type.
pub const TYPE_NAME_PRED: &str = "type_name";
/// Predicate carrying one is-a tag edge per supplied type.
pub const TYPE_TAG_PRED: &str = "node.type";

/// Shared concurrent set of XIDs already declared in export mode.
#[derive(Clone, Default)]
pub struct XidSet {
    seen: Arc<Mutex<HashSet<String>>>,
}

impl XidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the key; returns true if it was not seen before.
    pub fn first_seen(&self, key: &str) -> bool {
        self.seen.lock().expect("xid set poisoned").insert(key.to_owned())
    }
}

/// How entity references are produced.
#[derive(Clone)]
pub enum ResolveMode {
    /// Live loading: `uid(var)` references with upsert-lookup fragments
    Upsert,
    /// One-shot export: blank-node placeholders, deduplicated via the set
    Export(XidSet),
}

/// Result of resolving one (XID, type) pair.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Node reference usable as an edge subject or object
    pub uid: String,
    /// Assertion edges (type_name, primary key, type tags); empty when the
    /// XID was already declared in export mode
    pub nquads: Vec<NQuad>,
    /// Upsert-lookup fragment keyed by variable name, upsert mode only
    pub upsert: Option<(String, String)>,
}

/// Replace characters that are unsafe in query variables and blank-node ids.
/// Malformed XIDs are sanitized rather than rejected.
pub fn sanitize_xid(xid: &str) -> String {
    xid.replace([' ', '{', '}'], "_")
        .replace('*', "Y_Y")
        .replace('-', "X_X")
        .replace('?', "Z_Z")
        .replace('.', "_")
}

/// Resolve an XID for a target node type.
///
/// Pure and infallible; safe for concurrent callers (the export-mode set is
/// the only shared state and is internally synchronized).
pub fn resolve(
    mode: &ResolveMode,
    xid: &str,
    node_type: &str,
    pk_predicate: &str,
    pk_value: &str,
    type_tags: &[&str],
) -> Resolved {
    let name = sanitize_xid(xid);
    match mode {
        ResolveMode::Export(seen) => {
            // blank-node names drop the entity-kind prefixes carried by
            // application/instance XIDs; other types keep theirs verbatim
            let stripped = match node_type {
                "application" => name.strip_prefix("app_"),
                "instance" => name.strip_prefix("inst_"),
                _ => None,
            };
            let name = stripped.unwrap_or(&name).to_owned();
            let uid = format!("_:{name}");
            if !seen.first_seen(&name) {
                return Resolved {
                    uid,
                    nquads: Vec::new(),
                    upsert: None,
                };
            }
            Resolved {
                nquads: assertion_nquads(&uid, node_type, pk_predicate, pk_value, type_tags),
                uid,
                upsert: None,
            }
        }
        ResolveMode::Upsert => {
            let uid = format!("uid({name})");
            let fragment = format!(r#"{name} as var(func: eq({pk_predicate}, "{pk_value}"))"#);
            Resolved {
                nquads: assertion_nquads(&uid, node_type, pk_predicate, pk_value, type_tags),
                uid,
                upsert: Some((name, fragment)),
            }
        }
    }
}

fn assertion_nquads(
    uid: &str,
    node_type: &str,
    pk_predicate: &str,
    pk_value: &str,
    type_tags: &[&str],
) -> Vec<NQuad> {
    let mut nquads = Vec::with_capacity(2 + type_tags.len());
    nquads.push(NQuad::value(uid, TYPE_NAME_PRED, Value::str(node_type)));
    nquads.push(NQuad::value(uid, pk_predicate, Value::str(pk_value)));
    for tag in type_tags {
        nquads.push(NQuad::value(uid, TYPE_TAG_PRED, Value::str(*tag)));
    }
    nquads
}
