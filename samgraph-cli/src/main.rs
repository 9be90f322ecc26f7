//! Command-line driver for the samgraph bulk loader.
//!
//! Runs the aggregate loader against the in-memory reference store, either
//! as a dry run (commit and report) or in export mode (write RDF triples to
//! a file for offline bulk import).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use samgraph_core::MemoryStore;
use samgraph_loader::{AggregateLoader, LoaderConfig, DEFAULT_BATCH_SIZE, DEFAULT_COMMITTERS};

#[derive(Parser)]
#[command(name = "samgraph", about = "Versioned CSV inventory to graph-store bulk loader", version)]
struct Args {
    /// Drop the schema and all data before loading
    #[arg(long)]
    drop_schema: bool,

    /// Apply the schema files before loading
    #[arg(long)]
    create_schema: bool,

    /// Ingest skeleton-file metadata
    #[arg(long)]
    load_metadata: bool,

    /// Load equipment files
    #[arg(long)]
    load_equipments: bool,

    /// Load the static entity files
    #[arg(long)]
    load_static_data: bool,

    /// Root of the versioned per-scope snapshot tree
    #[arg(long, default_value = "data")]
    master_dir: PathBuf,

    /// Directory holding the header-only skeleton files
    #[arg(long, default_value = "skeletons")]
    skeleton_dir: PathBuf,

    /// Scopes (subdirectories of the master dir) to load
    #[arg(long, value_delimiter = ',')]
    scopes: Vec<String>,

    #[arg(long, value_delimiter = ',', default_value = "products.csv")]
    product_files: Vec<String>,

    #[arg(long, value_delimiter = ',', default_value = "applications.csv")]
    app_files: Vec<String>,

    #[arg(long, value_delimiter = ',', default_value = "applications_instances.csv")]
    inst_files: Vec<String>,

    #[arg(long, value_delimiter = ',', default_value = "products_acquiredRights.csv")]
    acq_rights_files: Vec<String>,

    #[arg(long, value_delimiter = ',', default_value = "products_equipments.csv")]
    product_equipment_files: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    equipment_files: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    metadata_files: Vec<String>,

    /// Schema files applied with --create-schema
    #[arg(long, value_delimiter = ',')]
    schema_files: Vec<PathBuf>,

    /// Persisted load-state file
    #[arg(long, default_value = "state.json")]
    state_file: PathBuf,

    /// Edges per mutation batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Concurrent commit workers
    #[arg(long, default_value_t = DEFAULT_COMMITTERS)]
    committers: usize,

    /// Write RDF triples to this file instead of committing to a store
    #[arg(long)]
    export: Option<PathBuf>,
}

fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("samgraph=info,samgraph_loader=info,samgraph_core=info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact());
    let _ = tracing::dispatcher::set_global_default(tracing::Dispatch::new(subscriber));
}

impl Args {
    fn into_config(self) -> LoaderConfig {
        LoaderConfig {
            drop_schema: self.drop_schema,
            create_schema: self.create_schema,
            load_metadata: self.load_metadata,
            load_default_equipment_types: false,
            load_equipments: self.load_equipments,
            load_static_data: self.load_static_data,
            master_dir: self.master_dir,
            skeleton_dir: self.skeleton_dir,
            scopes: self.scopes,
            product_files: self.product_files,
            app_files: self.app_files,
            inst_files: self.inst_files,
            acq_rights_files: self.acq_rights_files,
            product_equipment_files: self.product_equipment_files,
            equipment_files: self.equipment_files,
            metadata_files: self.metadata_files,
            schema_files: self.schema_files,
            state_file: self.state_file,
            batch_size: self.batch_size,
            committers: self.committers,
            export_file: self.export,
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = Args::parse();
    let config = args.into_config();

    let store = Arc::new(MemoryStore::new());
    let loader = AggregateLoader::new(config, store.clone());
    match loader.load().await {
        Ok(()) => {
            info!(
                nodes = store.node_count(),
                edges = store.edge_count(),
                "load complete"
            );
        }
        Err(err) => {
            error!(%err, "load failed");
            std::process::exit(1);
        }
    }
}
