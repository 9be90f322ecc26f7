//! Product-to-equipment link rows, carrying per-link user counts and
//! `updated`/`created` edge facets.

use samgraph_core::{DataType, NQuad, Value};
use tracing::warn;

use crate::schema::{fallback_predicate, PRODUCT_EQUIPMENT_SCHEMA};
use crate::xid::resolve;

use super::{facets::updated_created_facets, RowNquads, TransformCtx};

pub fn transform(ctx: &TransformCtx, columns: &[String], row: &[String], xid_idx: usize) -> RowNquads {
    let mut out = RowNquads::default();
    out.scope_edge = false;
    let swidtag = &row[xid_idx];
    let prod_uid = out.push_resolved(resolve(
        &ctx.mode,
        swidtag,
        "product",
        "product.swidtag",
        swidtag,
        &["Product"],
    ));

    let mut updated = "";
    let mut created = "";
    let mut equip_id = "";
    let mut equip_uid = String::new();
    let mut nb_users = "";

    for (i, cell) in row.iter().enumerate() {
        if i == xid_idx {
            continue;
        }
        let Some(column) = columns.get(i) else {
            warn!(extra = row.len() - columns.len(), "row is wider than the header, ignoring extra fields");
            break;
        };
        let predicate = PRODUCT_EQUIPMENT_SCHEMA
            .get(column.as_str())
            .map(|p| (*p).to_owned())
            .unwrap_or_else(|| fallback_predicate(column));
        match predicate.as_str() {
            "product.equipment" => {
                if cell.is_empty() {
                    continue;
                }
                equip_id = cell;
                equip_uid = out.push_resolved(resolve(
                    &ctx.mode,
                    cell,
                    "equipment",
                    "equipment.id",
                    cell,
                    &["Equipment"],
                ));
            }
            "users.count" => nb_users = cell,
            "updated" => updated = cell,
            "created" => created = cell,
            _ => {
                out.nquads
                    .push(NQuad::value(&prod_uid, predicate, Value::str(cell)));
            }
        }
    }

    let facets = updated_created_facets(updated, created);

    if !equip_uid.is_empty() {
        out.nquads.push(
            NQuad::link(&prod_uid, "product.equipment", &equip_uid)
                .with_facets(facets.clone()),
        );
    }

    out.subject = prod_uid.clone();
    if nb_users.is_empty() {
        return out;
    }

    // per-link user count lives on its own node keyed by both endpoints
    let users_id = format!("user_{swidtag}_{equip_id}");
    let users_uid = out.push_resolved(resolve(
        &ctx.mode,
        &users_id,
        "instance_users",
        "users.id",
        &users_id,
        &["User"],
    ));
    out.nquads.push(
        NQuad::link(&prod_uid, "product.users", &users_uid).with_facets(facets.clone()),
    );
    out.nquads
        .push(NQuad::link(&equip_uid, "equipment.users", &users_uid).with_facets(facets));

    match DataType::Int.convert(nb_users) {
        Ok(value) => out.nquads.push(NQuad::value(&users_uid, "users.count", value)),
        Err(err) => {
            warn!(swidtag = %swidtag, value = %nb_users, %err,
                "user count conversion failed, keeping raw value");
            out.nquads.push(NQuad::value(
                &users_uid,
                "users.count.failure",
                Value::default_val(nb_users),
            ));
        }
    }
    out
}
