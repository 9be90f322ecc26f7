//! End-to-end loader runs against the in-memory store.

use std::path::Path;
use std::sync::Arc;

use samgraph_core::{MemoryStore, StoredObject, Value};
use samgraph_loader::pipeline::StopSignal;
use samgraph_loader::{AggregateLoader, LoaderConfig, LoaderError};

fn write_csv(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn base_config(root: &Path) -> LoaderConfig {
    LoaderConfig {
        load_static_data: true,
        master_dir: root.join("master"),
        skeleton_dir: root.join("skeletons"),
        scopes: vec!["france".to_owned()],
        state_file: root.join("state.json"),
        ..LoaderConfig::default()
    }
}

fn products_csv() -> &'static str {
    "SWIDTag;Name;Editor;IsOptionOf;IdEquipment;updated\n\
     P1;Base Suite;Acme;;E1;2024-03-01T10:00:00Z\n\
     P2;Suite Option;Acme;P1;;2024-03-01T11:00:00Z\n"
}

#[tokio::test]
async fn full_load_builds_the_product_graph() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "master/france/v1/products.csv", products_csv());

    let mut config = base_config(dir.path());
    config.product_files = vec!["products.csv".to_owned()];
    let store = Arc::new(MemoryStore::new());
    let loader = AggregateLoader::new(config, store.clone());
    loader.load_with_stop(StopSignal::new()).await.unwrap();

    assert!(store.has_node("product.swidtag", "P1"));
    assert!(store.has_node("product.swidtag", "P2"));
    assert!(store.has_node("equipment.id", "E1"));
    assert!(store.has_node("editor.name", "Acme"));

    // P2 is an option of P1
    assert_eq!(store.edges_with_predicate("product.child").len(), 1);
    // P1 is installed on E1
    assert_eq!(store.edges_with_predicate("product.equipment").len(), 1);
    // both product rows carry the scope tag
    let scopes = store.edges_with_predicate("scopes");
    assert!(scopes
        .iter()
        .all(|e| e.object == StoredObject::Value(Value::str("france"))));
}

#[tokio::test]
async fn reloading_the_same_snapshot_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "master/france/v1/products.csv", products_csv());

    let mut config = base_config(dir.path());
    config.product_files = vec!["products.csv".to_owned()];
    let store = Arc::new(MemoryStore::new());

    AggregateLoader::new(config.clone(), store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();
    let nodes_after_first = store.node_count();

    // wipe the state file so the second run replays everything
    std::fs::remove_file(dir.path().join("state.json")).unwrap();
    AggregateLoader::new(config, store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();

    assert_eq!(
        store.node_count(),
        nodes_after_first,
        "upsert lookups must bind existing nodes instead of creating new ones"
    );
}

#[tokio::test]
async fn second_run_loads_only_new_version_dirs() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "master/france/v1/products.csv", products_csv());

    let mut config = base_config(dir.path());
    config.product_files = vec!["products.csv".to_owned()];
    let store = Arc::new(MemoryStore::new());
    AggregateLoader::new(config.clone(), store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();
    assert!(!store.has_node("product.swidtag", "P3"));

    write_csv(
        dir.path(),
        "master/france/v2/products.csv",
        "SWIDTag;Name;updated\nP3;New Product;2024-04-01T10:00:00Z\n",
    );
    AggregateLoader::new(config, store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();
    assert!(store.has_node("product.swidtag", "P3"));
}

#[tokio::test(start_paused = true)]
async fn conflicts_are_retried_until_the_load_completes() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "master/france/v1/products.csv", products_csv());

    let mut config = base_config(dir.path());
    config.product_files = vec!["products.csv".to_owned()];
    let store = Arc::new(MemoryStore::new());
    store.inject_conflicts(3);

    AggregateLoader::new(config, store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();
    assert!(store.has_node("product.swidtag", "P1"));
}

#[tokio::test]
async fn interrupt_surfaces_outstanding_aborts() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "master/france/v1/products.csv", products_csv());

    let mut config = base_config(dir.path());
    config.product_files = vec!["products.csv".to_owned()];
    let store = Arc::new(MemoryStore::new());
    // conflicts never clear, so the batch can only be abandoned
    store.inject_conflicts(usize::MAX);

    let stop = StopSignal::new();
    let loader = AggregateLoader::new(config, store.clone());
    let raiser = {
        let stop = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            stop.raise();
        })
    };
    let err = loader.load_with_stop(stop).await.unwrap_err();
    raiser.await.unwrap();

    match err {
        LoaderError::Aborted { count, .. } => assert!(count >= 1),
        other => panic!("expected aborted error, got: {other}"),
    }
    // nothing was confirmed committed
    assert_eq!(store.edge_count(), 0);
}

#[tokio::test]
async fn export_mode_writes_triples_instead_of_committing() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "master/france/v1/products.csv", products_csv());

    let mut config = base_config(dir.path());
    config.product_files = vec!["products.csv".to_owned()];
    config.export_file = Some(dir.path().join("export.rdf"));
    let store = Arc::new(MemoryStore::new());
    AggregateLoader::new(config, store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();

    assert_eq!(store.edge_count(), 0, "export mode must not touch the store");
    let contents = std::fs::read_to_string(dir.path().join("export.rdf")).unwrap();
    assert!(contents.contains("<_:P1> <product.swidtag> \"P1\"^^<xs:string>"));
    assert!(contents.lines().count() > 4);
}

#[tokio::test]
async fn one_bad_file_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "master/france/v1/products.csv", products_csv());
    write_csv(
        dir.path(),
        "master/france/v1/applications.csv",
        "WrongHeader;Name\nA1;Payroll\n",
    );

    let mut config = base_config(dir.path());
    config.product_files = vec!["products.csv".to_owned()];
    config.app_files = vec!["applications.csv".to_owned()];
    let store = Arc::new(MemoryStore::new());
    let err = AggregateLoader::new(config, store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap_err();

    match err {
        LoaderError::Aggregate(detail) => {
            assert!(detail.contains("applications.csv"), "detail: {detail}");
        }
        other => panic!("expected aggregate error, got: {other}"),
    }
    // the healthy file still landed
    assert!(store.has_node("product.swidtag", "P1"));
}

#[tokio::test]
async fn metadata_and_equipment_stages_run_together() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "skeletons/equipment_cluster.csv",
        "cluster_name;parent_id\n",
    );
    write_csv(
        dir.path(),
        "master/france/v1/equipment_cluster.csv",
        "cluster_name;parent_id\nCL1;DC1\n",
    );

    let mut config = base_config(dir.path());
    config.load_static_data = false;
    config.load_metadata = true;
    config.load_equipments = true;
    config.metadata_files = vec!["equipment_cluster.csv".to_owned()];
    config.equipment_files = vec!["equipment_cluster.csv".to_owned()];
    let store = Arc::new(MemoryStore::new());
    AggregateLoader::new(config, store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();

    assert!(store.has_node("metadata.source", "equipment_cluster.csv"));
    assert_eq!(store.edges_with_predicate("metadata.attributes").len(), 2);
    assert!(store.has_node("equipment.id", "CL1"));
    assert_eq!(store.edges_with_predicate("equipment.parent").len(), 1);
    let kinds = store.edges_with_predicate("equipment.type");
    assert!(kinds
        .iter()
        .any(|e| e.object == StoredObject::Value(Value::str("cluster"))));
}

#[tokio::test(start_paused = true)]
async fn metadata_conflicts_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "skeletons/equipment_server.csv",
        "server_name;parent_id\n",
    );

    let mut config = base_config(dir.path());
    config.load_static_data = false;
    config.load_metadata = true;
    config.metadata_files = vec!["equipment_server.csv".to_owned()];
    config.scopes = Vec::new();
    let store = Arc::new(MemoryStore::new());
    store.inject_conflicts(2);

    AggregateLoader::new(config, store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();
    assert!(store.has_node("metadata.source", "equipment_server.csv"));
}

#[tokio::test]
async fn schema_stages_run_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("products.schema");
    std::fs::write(&schema_path, "product.swidtag: string @index(exact) .\n").unwrap();

    let mut config = base_config(dir.path());
    config.load_static_data = false;
    config.drop_schema = true;
    config.create_schema = true;
    config.schema_files = vec![schema_path];
    let store = Arc::new(MemoryStore::new());
    AggregateLoader::new(config, store.clone())
        .load_with_stop(StopSignal::new())
        .await
        .unwrap();

    let schemas = store.schemas();
    assert_eq!(schemas.len(), 1);
    assert!(schemas[0].contains("product.swidtag"));
}
