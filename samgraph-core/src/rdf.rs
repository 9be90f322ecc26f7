//! Human-readable triple rendering for export mode.
//!
//! One line per edge, with a typed-literal suffix selected by the value kind
//! and facets rendered as a trailing `( k=v,... )` group.

use crate::nquad::{Facet, FacetKind, NQuad, Object};
use crate::value::Value;

/// Render one edge as a triple statement line (without trailing newline).
pub fn render_line(nq: &NQuad) -> String {
    let facets = render_facets(&nq.facets);
    match &nq.object {
        Object::Uid(uid) => format!("<{}> <{}> <{}> {}.", nq.subject, nq.predicate, uid, facets),
        Object::Value(value) => {
            let literal = match value {
                Value::Str(s) => format!("\"{}\"^^<xs:string>", s),
                Value::Int(i) => format!("\"{}\"^^<xs:int>", i),
                Value::Double(d) => format!("\"{}\"^^<xs:float>", d),
                Value::Default(s) => format!("\"{}\"^^<xs:string>", s),
            };
            format!("<{}> <{}> {} {}.", nq.subject, nq.predicate, literal, facets)
        }
    }
}

fn render_facets(facets: &[Facet]) -> String {
    if facets.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = facets
        .iter()
        .map(|f| match f.kind {
            FacetKind::String => format!("{}=\"{}\"", f.key, f.value),
            FacetKind::DateTime => format!("{}={}", f.key, f.value),
        })
        .collect();
    format!("( {} ) ", parts.join(","))
}
