//! Edge facets for `updated`/`created` provenance timestamps.

use chrono::{DateTime, Utc};
use samgraph_core::Facet;
use tracing::warn;

/// Build facets for the timestamps carried by a link row. A value that does
/// not parse as RFC 3339 is preserved under `<key>_str` instead of being
/// dropped.
pub fn updated_created_facets(updated: &str, created: &str) -> Vec<Facet> {
    let mut facets = Vec::with_capacity(2);
    for (key, raw) in [("updated", updated), ("created", created)] {
        if raw.is_empty() {
            continue;
        }
        match raw.parse::<DateTime<Utc>>() {
            Ok(ts) => facets.push(Facet::datetime(key, ts)),
            Err(err) => {
                warn!(key, value = raw, %err, "unparseable timestamp facet");
                facets.push(Facet::string(format!("{key}_str"), raw));
            }
        }
    }
    facets
}
