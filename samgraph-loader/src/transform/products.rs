//! Product catalog rows.

use samgraph_core::{NQuad, Value};
use tracing::warn;

use crate::schema::{fallback_predicate, PRODUCT_SCHEMA};
use crate::xid::resolve;

use super::{RowNquads, TransformCtx};

pub fn transform(ctx: &TransformCtx, columns: &[String], row: &[String], xid_idx: usize) -> RowNquads {
    let mut out = RowNquads::default();
    let swidtag = &row[xid_idx];
    let prod_uid = out.push_resolved(resolve(
        &ctx.mode,
        swidtag,
        "product",
        "product.swidtag",
        swidtag,
        &["Product"],
    ));

    for (i, cell) in row.iter().enumerate() {
        if i == xid_idx {
            continue;
        }
        let Some(column) = columns.get(i) else {
            warn!(extra = row.len() - columns.len(), "row is wider than the header, ignoring extra fields");
            break;
        };
        let predicate = PRODUCT_SCHEMA
            .get(column.as_str())
            .map(|p| (*p).to_owned())
            .unwrap_or_else(|| fallback_predicate(column));
        match predicate.as_str() {
            "product.child" => {
                if cell.is_empty() {
                    continue;
                }
                // the referenced product is the owner; it points at this option
                let child_uid = out.push_resolved(resolve(
                    &ctx.mode,
                    cell,
                    "product",
                    "product.swidtag",
                    cell,
                    &["Product"],
                ));
                out.nquads.push(NQuad::link(child_uid, predicate, &prod_uid));
            }
            "product.equipment" => {
                if cell.is_empty() {
                    continue;
                }
                let equip_uid = out.push_resolved(resolve(
                    &ctx.mode,
                    cell,
                    "equipment",
                    "equipment.id",
                    cell,
                    &["Equipment"],
                ));
                out.nquads.push(NQuad::link(&prod_uid, predicate, equip_uid));
            }
            "product.editor" => {
                if cell.is_empty() {
                    continue;
                }
                let editor_xid = format!("editor_{cell}");
                let editor_uid = out.push_resolved(resolve(
                    &ctx.mode,
                    &editor_xid,
                    "editor",
                    "editor.name",
                    cell,
                    &["Editor"],
                ));
                out.nquads
                    .push(NQuad::link(editor_uid, "editor.product", &prod_uid));
                out.nquads
                    .push(NQuad::value(&prod_uid, predicate, Value::str(cell)));
            }
            _ => {
                out.nquads
                    .push(NQuad::value(&prod_uid, predicate, Value::str(cell)));
            }
        }
    }
    out.subject = prod_uid;
    out
}
