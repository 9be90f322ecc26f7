//! Acquired-rights (license entitlement) rows with typed numeric columns.

use samgraph_core::{NQuad, Value};
use tracing::warn;

use crate::schema::{fallback_predicate, ACQ_RIGHTS_SCHEMA};
use crate::xid::resolve;

use super::{RowNquads, TransformCtx};

pub fn transform(ctx: &TransformCtx, columns: &[String], row: &[String], xid_idx: usize) -> RowNquads {
    let mut out = RowNquads::default();
    let sku = &row[xid_idx];
    let acq_uid = out.push_resolved(resolve(
        &ctx.mode,
        sku,
        "acqRights",
        "acqRights.SKU",
        sku,
        &["AcquiredRights"],
    ));

    for (i, cell) in row.iter().enumerate() {
        let Some(column) = columns.get(i) else {
            warn!(extra = row.len() - columns.len(), "row is wider than the header, ignoring extra fields");
            break;
        };
        let Some((predicate, data_type)) = ACQ_RIGHTS_SCHEMA.get(column.as_str()) else {
            out.nquads.push(NQuad::value(
                &acq_uid,
                fallback_predicate(column),
                Value::str(cell),
            ));
            continue;
        };
        match *predicate {
            "acqRights.swidtag" => {
                if cell.is_empty() {
                    continue;
                }
                out.nquads
                    .push(NQuad::value(&acq_uid, *predicate, Value::str(cell)));
                let prod_uid = out.push_resolved(resolve(
                    &ctx.mode,
                    cell,
                    "product",
                    "product.swidtag",
                    cell,
                    &["Product"],
                ));
                out.nquads
                    .push(NQuad::link(prod_uid, "product.acqRights", &acq_uid));
            }
            _ => match data_type.convert(cell) {
                Ok(value) => out.nquads.push(NQuad::value(&acq_uid, *predicate, value)),
                Err(err) => {
                    warn!(sku = %sku, column = %column, value = %cell, %err,
                        "value conversion failed, keeping raw value");
                    out.nquads.push(NQuad::value(
                        &acq_uid,
                        format!("{predicate}.failure"),
                        Value::default_val(cell),
                    ));
                }
            },
        }
    }
    out.subject = acq_uid;
    out
}
