//! Application inventory rows.

use samgraph_core::{NQuad, Value};
use tracing::warn;

use crate::schema::{fallback_predicate, APPLICATION_SCHEMA};
use crate::xid::resolve;

use super::{RowNquads, TransformCtx};

pub fn transform(ctx: &TransformCtx, columns: &[String], row: &[String], xid_idx: usize) -> RowNquads {
    let mut out = RowNquads::default();
    let app_id = &row[xid_idx];
    // application XIDs share a namespace with other entities, hence the prefix
    let app_uid = out.push_resolved(resolve(
        &ctx.mode,
        &format!("app_{app_id}"),
        "application",
        "application.id",
        app_id,
        &["Application"],
    ));

    for (i, cell) in row.iter().enumerate() {
        let Some(column) = columns.get(i) else {
            warn!(extra = row.len() - columns.len(), "row is wider than the header, ignoring extra fields");
            break;
        };
        let predicate = APPLICATION_SCHEMA
            .get(column.as_str())
            .map(|p| (*p).to_owned())
            .unwrap_or_else(|| fallback_predicate(column));
        match predicate.as_str() {
            "application.product" => {
                if cell.is_empty() {
                    continue;
                }
                let prod_uid = out.push_resolved(resolve(
                    &ctx.mode,
                    cell,
                    "product",
                    "product.swidtag",
                    cell,
                    &["Product"],
                ));
                out.nquads.push(NQuad::link(&app_uid, predicate, prod_uid));
            }
            _ => {
                out.nquads
                    .push(NQuad::value(&app_uid, predicate, Value::str(cell)));
            }
        }
    }
    out.subject = app_uid;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xid::ResolveMode;
    use samgraph_core::Object;

    #[test]
    fn links_application_to_product() {
        let ctx = TransformCtx::new(ResolveMode::Upsert);
        let columns: Vec<String> = ["IdApplication", "Name", "SWIDTag"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let row: Vec<String> = ["A1", "Payroll", "P1"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let out = transform(&ctx, &columns, &row, 0);

        assert_eq!(out.subject, "uid(app_A1)");
        assert!(out.nquads.iter().any(|nq| {
            nq.subject == "uid(app_A1)"
                && nq.predicate == "application.product"
                && nq.object == Object::Uid("uid(P1)".to_owned())
        }));
        // the pk assertion carries the raw id, not the prefixed XID
        assert!(out.nquads.iter().any(|nq| {
            nq.predicate == "application.id"
                && nq.object == Object::Value(Value::str("A1"))
        }));
    }
}
