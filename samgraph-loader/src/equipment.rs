//! Equipment types and equipment CSV ingestion.
//!
//! Equipment files have no fixed schema: each equipment type describes its
//! own attributes and how they map onto CSV headers. The default hierarchy
//! (datacenter down to partition) is seeded through a registry before any
//! equipment file is read, parent before child.

use std::collections::HashMap;

use async_trait::async_trait;
use samgraph_core::{DataType, NQuad, Value};
use tracing::{info, warn};

use crate::error::{LoaderError, Result};
use crate::transform::RowNquads;
use crate::xid::{resolve, ResolveMode};

/// One attribute of an equipment type, with its CSV column mapping.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    pub is_identifier: bool,
    pub is_parent_identifier: bool,
    pub is_displayed: bool,
    pub is_searchable: bool,
    /// CSV header this attribute reads from
    pub mapped_to: String,
}

impl Attribute {
    fn new(name: &str, data_type: DataType, mapped_to: &str) -> Self {
        Attribute {
            name: name.to_owned(),
            data_type,
            is_identifier: false,
            is_parent_identifier: false,
            is_displayed: true,
            is_searchable: true,
            mapped_to: mapped_to.to_owned(),
        }
    }

    fn identifier(name: &str, mapped_to: &str) -> Self {
        Attribute {
            is_identifier: true,
            ..Attribute::new(name, DataType::String, mapped_to)
        }
    }

    fn parent(mapped_to: &str) -> Self {
        Attribute {
            is_parent_identifier: true,
            is_searchable: false,
            ..Attribute::new("Parent", DataType::String, mapped_to)
        }
    }
}

/// A dynamic equipment type: which CSV file feeds it, where it sits in the
/// hierarchy and which attributes it carries.
#[derive(Debug, Clone)]
pub struct EquipmentType {
    pub kind: String,
    /// Skeleton file name the type is populated from
    pub source_name: String,
    /// Metadata node id for the source file, resolved during seeding
    pub source_id: Option<String>,
    /// Registry id of the parent type, assigned during seeding
    pub parent_id: Option<String>,
    /// Registry id of this type, assigned during seeding
    pub id: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl EquipmentType {
    pub fn new(kind: &str, source_name: &str, attributes: Vec<Attribute>) -> Self {
        EquipmentType {
            kind: kind.to_owned(),
            source_name: source_name.to_owned(),
            source_id: None,
            parent_id: None,
            id: None,
            attributes,
        }
    }

    /// The attribute holding the primary key.
    pub fn identifier_attribute(&self) -> Result<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.is_identifier)
            .ok_or_else(|| LoaderError::NoIdentifierAttribute(self.kind.clone()))
    }

    /// Predicate an attribute's values are stored under.
    pub fn attribute_predicate(&self, attr: &Attribute) -> String {
        format!("equipment.{}.{}", self.kind, attr.name)
    }
}

/// Reference to an ingested metadata node.
#[derive(Debug, Clone)]
pub struct MetadataRef {
    pub id: String,
    pub source: String,
}

/// Where equipment types are registered before loading begins.
#[async_trait]
pub trait EquipmentTypeRegistry: Send + Sync {
    /// Metadata nodes previously ingested for equipment sources.
    async fn equipment_metadata(&self) -> Result<Vec<MetadataRef>>;

    /// Register one type; returns the assigned id.
    async fn create_equipment_type(&self, eq_type: &EquipmentType) -> Result<String>;
}

/// The built-in hierarchy, root first.
pub fn default_equipment_types() -> Vec<EquipmentType> {
    vec![
        EquipmentType::new(
            "datacenter",
            "equipment_datacenter.csv",
            vec![Attribute::identifier("Name", "datacenter_name")],
        ),
        EquipmentType::new(
            "vcenter",
            "equipment_vcenter.csv",
            vec![
                Attribute::identifier("VcenterName", "vcenter_name"),
                Attribute::parent("parent_id"),
            ],
        ),
        EquipmentType::new(
            "cluster",
            "equipment_cluster.csv",
            vec![
                Attribute::identifier("ClusterName", "cluster_name"),
                Attribute::parent("parent_id"),
            ],
        ),
        EquipmentType::new(
            "server",
            "equipment_server.csv",
            vec![
                Attribute::identifier("HostName", "server_hostname"),
                Attribute::new("ServerCode", DataType::String, "server_code"),
                Attribute::new("ServerManufacturer", DataType::String, "server_manufacturer"),
                Attribute::new("ServerModel", DataType::String, "server_model"),
                Attribute::new("ServerSerialNumber", DataType::String, "server_serialNumber"),
                Attribute::new(
                    "ServerDateInstallation",
                    DataType::String,
                    "server_DateInstallation",
                ),
                Attribute::new(
                    "ServerProprietaryEntity",
                    DataType::String,
                    "server_proprietaryEntity",
                ),
                Attribute::new("ServerHostingEntity", DataType::String, "server_hostingEntity"),
                Attribute::new("ServerUserEntity", DataType::String, "server_userEntity"),
                Attribute::new("ServerSite", DataType::String, "server_Site"),
                Attribute::new("ServerCPU", DataType::String, "server_cpu"),
                Attribute::new(
                    "ServerProcessorsNumber",
                    DataType::Int,
                    "server_processorsNumber",
                ),
                Attribute::new("ServerCoresNumber", DataType::Int, "server_coresNumber"),
                Attribute::new("OracleCoreFactor", DataType::Float, "corefactor_oracle"),
                Attribute::new("SAG", DataType::Float, "sag"),
                Attribute::new("PVU", DataType::Int, "pvu"),
                Attribute::parent("parent_id"),
            ],
        ),
        EquipmentType::new(
            "partition",
            "equipment_partition.csv",
            vec![
                Attribute::identifier("HostName", "partition_hostname"),
                Attribute::new("PartitionCode", DataType::String, "partition_code"),
                Attribute::new("PartitionRole", DataType::String, "partition_role"),
                Attribute::new("Environment", DataType::String, "partition_environment"),
                Attribute::new("PartitionShortOs", DataType::String, "partition_shortOS"),
                Attribute::new(
                    "PartitionNormalizedOs",
                    DataType::String,
                    "partition_normalizedOS",
                ),
                Attribute::new("CPU", DataType::String, "partition_cpu"),
                Attribute::new("ProcessorNumber", DataType::String, "partition_processorsNumber"),
                Attribute::new("CoresNumber", DataType::String, "partition_coresNumber"),
                Attribute::parent("parent_id"),
            ],
        ),
    ]
}

/// Seed the default hierarchy into the registry, parent before child. Each
/// type's source id is resolved against previously ingested metadata; a
/// missing source is logged but does not stop the seeding.
pub async fn seed_default_types(registry: &dyn EquipmentTypeRegistry) -> Result<Vec<EquipmentType>> {
    let metas = registry.equipment_metadata().await?;
    let mut types = default_equipment_types();
    let mut parent_id: Option<String> = None;
    for eq_type in &mut types {
        eq_type.source_id = metas
            .iter()
            .find(|m| m.source == eq_type.source_name)
            .map(|m| m.id.clone());
        if eq_type.source_id.is_none() {
            warn!(source = %eq_type.source_name, kind = %eq_type.kind,
                "no metadata found for equipment source");
        }
        eq_type.parent_id = parent_id.take();
        let id = registry.create_equipment_type(eq_type).await?;
        info!(kind = %eq_type.kind, id = %id, "registered equipment type");
        eq_type.id = Some(id.clone());
        parent_id = Some(id);
    }
    Ok(types)
}

/// An equipment type bound to the header of one concrete CSV file.
#[derive(Debug)]
pub struct BoundType<'a> {
    eq_type: &'a EquipmentType,
    pk_idx: usize,
    attrs: HashMap<usize, &'a Attribute>,
}

impl<'a> BoundType<'a> {
    /// Match the type's attribute mappings against the file header.
    /// Attributes whose column is absent are skipped with a warning.
    pub fn bind(eq_type: &'a EquipmentType, columns: &[String], file: &str) -> Result<Self> {
        let pk_attr = eq_type.identifier_attribute()?;
        let pk_idx = columns
            .iter()
            .position(|c| *c == pk_attr.mapped_to)
            .ok_or_else(|| LoaderError::MissingXidColumn {
                file: file.to_owned(),
                column: pk_attr.mapped_to.clone(),
            })?;
        let mut attrs = HashMap::with_capacity(eq_type.attributes.len());
        for attr in &eq_type.attributes {
            match columns.iter().position(|c| *c == attr.mapped_to) {
                Some(idx) => {
                    attrs.insert(idx, attr);
                }
                None => warn!(column = %attr.mapped_to, file, "mapped column not in header"),
            }
        }
        Ok(BoundType {
            eq_type,
            pk_idx,
            attrs,
        })
    }

    pub fn pk_idx(&self) -> usize {
        self.pk_idx
    }

    /// Turn one equipment row into edges. The caller has already checked the
    /// primary key is non-empty.
    pub fn transform_row(&self, mode: &ResolveMode, row: &[String]) -> RowNquads {
        let mut out = RowNquads::default();
        let equip_id = &row[self.pk_idx];
        let uid = out.push_resolved(resolve(
            mode,
            equip_id,
            "equipment",
            "equipment.id",
            equip_id,
            &["Equipment"],
        ));
        out.nquads.push(NQuad::value(
            &uid,
            "equipment.type",
            Value::str(&self.eq_type.kind),
        ));

        for (idx, cell) in row.iter().enumerate() {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            let Some(attr) = self.attrs.get(&idx) else {
                continue;
            };
            if attr.is_identifier {
                continue;
            }
            if attr.is_parent_identifier {
                let parent_uid = out.push_resolved(resolve(
                    mode,
                    cell,
                    "equipment",
                    "equipment.id",
                    cell,
                    &["Equipment"],
                ));
                out.nquads
                    .push(NQuad::link(&uid, "equipment.parent", parent_uid));
                continue;
            }
            let predicate = self.eq_type.attribute_predicate(attr);
            match attr.data_type.convert(cell) {
                Ok(value) => out.nquads.push(NQuad::value(&uid, predicate, value)),
                Err(err) => {
                    warn!(equipment = %equip_id, attribute = %attr.name, value = %cell, %err,
                        "attribute conversion failed, keeping raw value");
                    out.nquads.push(NQuad::value(
                        &uid,
                        format!("{predicate}.failure"),
                        Value::default_val(cell),
                    ));
                }
            }
        }
        out.subject = uid;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samgraph_core::Object;
    use std::sync::Mutex;

    fn strs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn default_hierarchy_is_root_first() {
        let types = default_equipment_types();
        let kinds: Vec<&str> = types.iter().map(|t| t.kind.as_str()).collect();
        assert_eq!(
            kinds,
            ["datacenter", "vcenter", "cluster", "server", "partition"]
        );
        for t in &types {
            assert!(t.identifier_attribute().is_ok());
        }
    }

    #[test]
    fn bound_type_converts_and_links_parent() {
        let types = default_equipment_types();
        let server = &types[3];
        let columns = strs(&[
            "server_hostname",
            "server_coresNumber",
            "corefactor_oracle",
            "parent_id",
        ]);
        let bound = BoundType::bind(server, &columns, "equipment_server.csv").unwrap();
        assert_eq!(bound.pk_idx(), 0);

        let row = strs(&["srv-1", "16", "0.5", "CL1"]);
        let out = bound.transform_row(&ResolveMode::Upsert, &row);
        assert_eq!(out.subject, "uid(srvX_X1)");
        assert!(out.nquads.iter().any(|nq| {
            nq.predicate == "equipment.server.ServerCoresNumber"
                && nq.object == Object::Value(Value::Int(16))
        }));
        assert!(out.nquads.iter().any(|nq| {
            nq.predicate == "equipment.parent" && nq.object == Object::Uid("uid(CL1)".to_owned())
        }));
    }

    #[test]
    fn conversion_failure_keeps_raw_value() {
        let types = default_equipment_types();
        let server = &types[3];
        let columns = strs(&["server_hostname", "pvu"]);
        let bound = BoundType::bind(server, &columns, "equipment_server.csv").unwrap();
        let row = strs(&["srv-1", "many"]);
        let out = bound.transform_row(&ResolveMode::Upsert, &row);
        assert!(out.nquads.iter().any(|nq| {
            nq.predicate == "equipment.server.PVU.failure"
                && nq.object == Object::Value(Value::default_val("many"))
        }));
    }

    #[test]
    fn missing_pk_column_is_an_error() {
        let types = default_equipment_types();
        let err = BoundType::bind(&types[0], &strs(&["unrelated"]), "equipment_datacenter.csv")
            .unwrap_err();
        assert!(matches!(err, LoaderError::MissingXidColumn { .. }));
    }

    struct FakeRegistry {
        metas: Vec<MetadataRef>,
        created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EquipmentTypeRegistry for FakeRegistry {
        async fn equipment_metadata(&self) -> Result<Vec<MetadataRef>> {
            Ok(self.metas.clone())
        }

        async fn create_equipment_type(&self, eq_type: &EquipmentType) -> Result<String> {
            let mut created = self.created.lock().unwrap();
            created.push(eq_type.kind.clone());
            Ok(format!("0x{}", created.len()))
        }
    }

    #[tokio::test]
    async fn seeding_assigns_parents_in_order() {
        let registry = FakeRegistry {
            metas: vec![MetadataRef {
                id: "0xm1".to_owned(),
                source: "equipment_server.csv".to_owned(),
            }],
            created: Mutex::new(Vec::new()),
        };
        let types = seed_default_types(&registry).await.unwrap();

        assert_eq!(types[0].parent_id, None);
        for pair in types.windows(2) {
            assert_eq!(pair[1].parent_id, pair[0].id);
        }
        let server = types.iter().find(|t| t.kind == "server").unwrap();
        assert_eq!(server.source_id.as_deref(), Some("0xm1"));
        assert_eq!(
            *registry.created.lock().unwrap(),
            ["datacenter", "vcenter", "cluster", "server", "partition"]
        );
    }
}
