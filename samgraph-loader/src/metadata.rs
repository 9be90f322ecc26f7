//! Skeleton-file metadata ingestion.
//!
//! Before equipment files are loaded, each skeleton file contributes one
//! metadata node describing its source and header columns. Equipment-type
//! seeding later resolves source files against these nodes.

use std::path::Path;

use samgraph_core::{MutationRequest, NQuad, Value};

use crate::transform::RowNquads;
use crate::xid::{resolve, ResolveMode, TYPE_NAME_PRED};

/// Build the mutation describing one skeleton file's header.
pub fn metadata_request(mode: &ResolveMode, filename: &Path, columns: &[String]) -> MutationRequest {
    let source = filename
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string_lossy().into_owned());

    let mut out = RowNquads::default();
    let xid = format!("metadata_{source}");
    let uid = out.push_resolved(resolve(
        mode,
        &xid,
        "metadata",
        "metadata.source",
        &source,
        &["Metadata"],
    ));
    out.nquads
        .push(NQuad::value(&uid, "metadata.type", Value::str("equipment")));
    for column in columns {
        out.nquads
            .push(NQuad::value(&uid, "metadata.attributes", Value::str(column)));
    }
    MutationRequest::new(&out.upserts, out.nquads)
}
