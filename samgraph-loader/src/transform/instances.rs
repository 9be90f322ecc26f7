//! Deployment instance rows.

use samgraph_core::{NQuad, Value};
use tracing::warn;

use crate::schema::{fallback_predicate, INSTANCE_SCHEMA};
use crate::xid::resolve;

use super::{RowNquads, TransformCtx};

pub fn transform(ctx: &TransformCtx, columns: &[String], row: &[String], xid_idx: usize) -> RowNquads {
    let mut out = RowNquads::default();
    let inst_id = &row[xid_idx];
    let inst_uid = out.push_resolved(resolve(
        &ctx.mode,
        &format!("inst_{inst_id}"),
        "instance",
        "instance.id",
        inst_id,
        &["Instance"],
    ));

    for (i, cell) in row.iter().enumerate() {
        let Some(column) = columns.get(i) else {
            warn!(extra = row.len() - columns.len(), "row is wider than the header, ignoring extra fields");
            break;
        };
        let predicate = match INSTANCE_SCHEMA.get(column.as_str()) {
            Some(p) => (*p).to_owned(),
            // instance files may carry the owning application's id column
            None if column == "IdApplication" => "application.id".to_owned(),
            None => fallback_predicate(column),
        };
        match predicate.as_str() {
            "instance.product" => {
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
                out.nquads.push(NQuad::link(&inst_uid, predicate, prod_uid));
            }
            "application.id" => {
                if cell.is_empty() {
                    continue;
                }
                let app_uid = out.push_resolved(resolve(
                    &ctx.mode,
                    &format!("app_{cell}"),
                    "application",
                    "application.id",
                    cell,
                    &["Application"],
                ));
                out.nquads
                    .push(NQuad::link(app_uid, "application.instance", &inst_uid));
            }
            "instance.equipment" => {
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
                out.nquads.push(NQuad::link(&inst_uid, predicate, equip_uid));
            }
            _ => {
                out.nquads
                    .push(NQuad::value(&inst_uid, predicate, Value::str(cell)));
            }
        }
    }
    out.subject = inst_uid;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xid::ResolveMode;
    use samgraph_core::Object;

    #[test]
    fn links_instance_to_application_product_and_equipment() {
        let ctx = TransformCtx::new(ResolveMode::Upsert);
        let columns: Vec<String> = ["IdInstance", "IdApplication", "SWIDTag", "IdEquipment"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let row: Vec<String> = ["I1", "A1", "P1", "E1"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let out = transform(&ctx, &columns, &row, 0);

        assert_eq!(out.subject, "uid(inst_I1)");
        assert!(out.nquads.iter().any(|nq| {
            nq.subject == "uid(app_A1)"
                && nq.predicate == "application.instance"
                && nq.object == Object::Uid("uid(inst_I1)".to_owned())
        }));
        assert!(out
            .nquads
            .iter()
            .any(|nq| nq.predicate == "instance.product"));
        assert!(out
            .nquads
            .iter()
            .any(|nq| nq.predicate == "instance.equipment"));
    }
}
