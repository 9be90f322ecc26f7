//! Static column-to-predicate schemas for the fixed entity files.
//!
//! Columns absent from a map fall back to the sanitized header text, so new
//! inventory columns land in the graph without a code change.

use std::collections::HashMap;
use std::sync::LazyLock;

use samgraph_core::DataType;

pub static PRODUCT_SCHEMA: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("Name", "product.name"),
        ("Version", "product.version"),
        ("Category", "product.category"),
        ("Editor", "product.editor"),
        ("SWIDTag", "product.swidtag"),
        ("IsOptionOf", "product.child"),
        ("IdEquipment", "product.equipment"),
    ])
});

pub static APPLICATION_SCHEMA: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("IdApplication", "application.id"),
            ("Name", "application.name"),
            ("Version", "application.version"),
            ("Owner", "application.owner"),
            ("IdInstance", "application.instance"),
            ("SWIDTag", "application.product"),
        ])
    });

pub static INSTANCE_SCHEMA: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("IdInstance", "instance.id"),
        ("Environment", "instance.environment"),
        ("SWIDTag", "instance.product"),
        ("IdEquipment", "instance.equipment"),
    ])
});

pub static PRODUCT_EQUIPMENT_SCHEMA: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("SWIDTag", "product.swidtag"),
            ("IdEquipment", "product.equipment"),
            ("NbUsers", "users.count"),
        ])
    });

pub static ACQ_RIGHTS_SCHEMA: LazyLock<HashMap<&'static str, (&'static str, DataType)>> =
    LazyLock::new(|| {
        HashMap::from([
            ("Entity", ("acqRights.entity", DataType::String)),
            ("SKU", ("acqRights.SKU", DataType::String)),
            ("SWIDTag", ("acqRights.swidtag", DataType::String)),
            ("Product name", ("acqRights.productName", DataType::String)),
            ("Editor", ("acqRights.editor", DataType::String)),
            ("Metric", ("acqRights.metric", DataType::String)),
            (
                "Acquired licenses number",
                ("acqRights.numOfAcqLicences", DataType::Int),
            ),
            (
                "Licenses under maintenance number",
                ("acqRights.numOfLicencesUnderMaintenance", DataType::Int),
            ),
            ("AVG Unit Price", ("acqRights.averageUnitPrice", DataType::Float)),
            (
                "AVG Maintenant Unit Price",
                ("acqRights.averageMaintenantUnitPrice", DataType::Float),
            ),
            (
                "Total purchase cost",
                ("acqRights.totalPurchaseCost", DataType::Float),
            ),
            (
                "Total maintenance cost",
                ("acqRights.totalMaintenanceCost", DataType::Float),
            ),
            ("Total cost", ("acqRights.totalCost", DataType::Float)),
            ("updated", ("updated", DataType::String)),
            ("created", ("created", DataType::String)),
        ])
    });

/// Fallback predicate for a header with no mapping.
pub fn fallback_predicate(column: &str) -> String {
    column.trim().replace(' ', "_")
}
