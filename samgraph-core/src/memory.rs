//! In-memory reference implementation of [`GraphStore`].
//!
//! Resolves upsert-lookup fragments against a (predicate, value) index the
//! way the real store binds `uid(var)` references: an existing node sharing
//! the key is reused, otherwise a fresh node is allocated. Batches apply
//! atomically. Conflicts can be injected for retry testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::nquad::{MutationRequest, Object};
use crate::store::{GraphStore, MutateStats, StoreError, StoreResult};
use crate::value::Value;

/// Target of a committed edge.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredObject {
    Node(u64),
    Value(Value),
}

/// One committed edge.
#[derive(Debug, Clone)]
pub struct StoredEdge {
    pub subject: u64,
    pub predicate: String,
    pub object: StoredObject,
}

#[derive(Default)]
struct Inner {
    next_uid: u64,
    /// (predicate, value) -> node, the upsert binding index
    key_index: HashMap<(String, String), u64>,
    edges: Vec<StoredEdge>,
    node_count: usize,
    schemas: Vec<String>,
}

/// In-memory graph store with scriptable conflict injection.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Next N mutate calls fail with a conflict before applying anything
    conflicts_remaining: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` mutate calls fail with [`StoreError::Conflict`].
    pub fn inject_conflicts(&self, n: usize) {
        self.conflicts_remaining.store(n, Ordering::SeqCst);
    }

    /// Total distinct nodes ever allocated.
    pub fn node_count(&self) -> usize {
        self.inner.lock().expect("store poisoned").node_count
    }

    /// Total committed edges.
    pub fn edge_count(&self) -> usize {
        self.inner.lock().expect("store poisoned").edges.len()
    }

    /// Committed edges with the given predicate.
    pub fn edges_with_predicate(&self, predicate: &str) -> Vec<StoredEdge> {
        let inner = self.inner.lock().expect("store poisoned");
        inner
            .edges
            .iter()
            .filter(|e| e.predicate == predicate)
            .cloned()
            .collect()
    }

    /// Whether a node bound to (predicate, value) exists.
    pub fn has_node(&self, predicate: &str, value: &str) -> bool {
        let inner = self.inner.lock().expect("store poisoned");
        inner
            .key_index
            .contains_key(&(predicate.to_owned(), value.to_owned()))
    }

    /// Schemas applied via `alter_schema`.
    pub fn schemas(&self) -> Vec<String> {
        self.inner.lock().expect("store poisoned").schemas.clone()
    }

    /// Parse `var as var(func: eq(pred, "val"))` fragments out of the
    /// request's query block.
    fn parse_lookups(query: &str) -> Vec<(String, String, String)> {
        let mut lookups = Vec::new();
        for line in query.lines() {
            let line = line.trim();
            let Some((var, rest)) = line.split_once(" as var(func: eq(") else {
                continue;
            };
            let Some(args) = rest.strip_suffix("))") else {
                continue;
            };
            let Some((pred, val)) = args.split_once(", ") else {
                continue;
            };
            let val = val.trim_matches('"');
            lookups.push((var.to_owned(), pred.to_owned(), val.to_owned()));
        }
        lookups
    }
}

fn resolve_ref(
    next_uid: &mut u64,
    bindings: &mut HashMap<String, u64>,
    created: &mut usize,
    reference: &str,
) -> StoreResult<u64> {
    // `uid(var)` references resolve through the upsert bindings; blank
    // `_:name` placeholders allocate one node per name per batch.
    let key = if let Some(var) = reference
        .strip_prefix("uid(")
        .and_then(|r| r.strip_suffix(')'))
    {
        var.to_owned()
    } else if let Some(name) = reference.strip_prefix("_:") {
        format!("_:{name}")
    } else {
        return Err(StoreError::InvalidMutation(format!(
            "unresolvable node reference: {reference}"
        )));
    };

    if let Some(&uid) = bindings.get(&key) {
        return Ok(uid);
    }
    *next_uid += 1;
    *created += 1;
    let uid = *next_uid;
    bindings.insert(key, uid);
    Ok(uid)
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn mutate(&self, req: &MutationRequest) -> StoreResult<MutateStats> {
        if self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Conflict("injected conflict".to_owned()));
        }

        let mut inner = self.inner.lock().expect("store poisoned");
        let mut bindings: HashMap<String, u64> = HashMap::new();
        let mut created = 0usize;

        // Bind lookup variables first so `uid(var)` reuses existing nodes.
        for (var, pred, val) in Self::parse_lookups(&req.query) {
            if let Some(&uid) = inner.key_index.get(&(pred.clone(), val.clone())) {
                bindings.insert(var, uid);
            }
        }

        // Stage the whole batch, node allocation included, before touching
        // committed state.
        let mut next_uid = inner.next_uid;
        let mut staged = Vec::with_capacity(req.set.len());
        for nq in &req.set {
            let subject = resolve_ref(&mut next_uid, &mut bindings, &mut created, &nq.subject)?;
            let object = match &nq.object {
                Object::Uid(uid) => StoredObject::Node(resolve_ref(
                    &mut next_uid,
                    &mut bindings,
                    &mut created,
                    uid,
                )?),
                Object::Value(v) => StoredObject::Value(v.clone()),
            };
            staged.push(StoredEdge {
                subject,
                predicate: nq.predicate.clone(),
                object,
            });
        }
        inner.next_uid = next_uid;
        inner.node_count += created;

        // Register newly-bound upsert keys so later batches find them.
        for (var, pred, val) in Self::parse_lookups(&req.query) {
            if let Some(&uid) = bindings.get(&var) {
                inner.key_index.entry((pred, val)).or_insert(uid);
            }
        }

        let edges = staged.len();
        inner.edges.extend(staged);
        Ok(MutateStats {
            edges,
            created_nodes: created,
        })
    }

    async fn alter_schema(&self, schema: &str) -> StoreResult<()> {
        self.inner
            .lock()
            .expect("store poisoned")
            .schemas
            .push(schema.to_owned());
        Ok(())
    }

    async fn drop_all(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store poisoned");
        *inner = Inner::default();
        Ok(())
    }
}
