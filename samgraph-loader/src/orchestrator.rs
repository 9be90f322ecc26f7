//! Aggregate load orchestration.
//!
//! Sequences the operations selected by [`LoaderConfig`]: schema drop,
//! schema create, skeleton metadata, equipment-type seeding, equipment
//! files, static entity files. All file passes share one stop signal, one
//! abort counter and one commit pipeline; per-file failures are aggregated
//! so one bad file never stops the others.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use samgraph_core::{GraphStore, MutationRequest};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::equipment::{default_equipment_types, seed_default_types, EquipmentType, EquipmentTypeRegistry};
use crate::error::{LoaderError, Result};
use crate::export::RdfSink;
use crate::metadata::metadata_request;
use crate::pipeline::{
    AbortCounter, CommitPipeline, CommitSink, PipelineConfig, StopSignal, DEFAULT_BATCH_SIZE,
    DEFAULT_COMMITTERS,
};
use crate::reader::{csv_columns, FileJob, FileRunner};
use crate::state::{version_dirs, FileCursor, MasterTracker};
use crate::transform::{EntityKind, TransformCtx};
use crate::xid::{ResolveMode, XidSet};

/// Everything one run needs: operations to perform, where the data lives and
/// how the pipeline is sized.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Drop the schema and all data first
    pub drop_schema: bool,
    /// Apply the schema files
    pub create_schema: bool,
    /// Ingest skeleton-file metadata
    pub load_metadata: bool,
    /// Seed the default equipment-type hierarchy
    pub load_default_equipment_types: bool,
    /// Load equipment files (requires equipment types)
    pub load_equipments: bool,
    /// Load the static entity files (products, applications, ...)
    pub load_static_data: bool,

    /// Root of the versioned per-scope snapshot tree
    pub master_dir: PathBuf,
    /// Directory holding the header-only skeleton files
    pub skeleton_dir: PathBuf,
    pub scopes: Vec<String>,

    pub product_files: Vec<String>,
    pub app_files: Vec<String>,
    pub inst_files: Vec<String>,
    pub acq_rights_files: Vec<String>,
    pub product_equipment_files: Vec<String>,
    pub equipment_files: Vec<String>,
    pub metadata_files: Vec<String>,
    pub schema_files: Vec<PathBuf>,

    /// Persisted load-state file
    pub state_file: PathBuf,
    pub batch_size: usize,
    pub committers: usize,
    /// Write triples to this file instead of committing to the store
    pub export_file: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            drop_schema: false,
            create_schema: false,
            load_metadata: false,
            load_default_equipment_types: false,
            load_equipments: false,
            load_static_data: false,
            master_dir: PathBuf::from("data"),
            skeleton_dir: PathBuf::from("skeletons"),
            scopes: Vec::new(),
            product_files: Vec::new(),
            app_files: Vec::new(),
            inst_files: Vec::new(),
            acq_rights_files: Vec::new(),
            product_equipment_files: Vec::new(),
            equipment_files: Vec::new(),
            metadata_files: Vec::new(),
            schema_files: Vec::new(),
            state_file: PathBuf::from("state.json"),
            batch_size: DEFAULT_BATCH_SIZE,
            committers: DEFAULT_COMMITTERS,
            export_file: None,
        }
    }
}

/// Commit one out-of-pipeline request, retrying conflicts with the same
/// widening backoff the commit pool uses.
async fn commit_with_retry(
    sink: &CommitSink,
    req: &MutationRequest,
    stop: &StopSignal,
) -> Result<()> {
    let mut attempt: u64 = 1;
    loop {
        match sink.commit(req).await {
            Ok(_) => return Ok(()),
            Err(err) if err.is_conflict() => {
                let secs = rand::thread_rng().gen_range(attempt..2 * attempt + 9);
                warn!(attempt, delay_secs = secs, %err, "commit conflict, backing off");
                tokio::select! {
                    _ = stop.raised() => return Err(LoaderError::Interrupted),
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                }
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Runs every configured stage against one store.
pub struct AggregateLoader {
    config: LoaderConfig,
    store: Arc<dyn GraphStore>,
    registry: Option<Arc<dyn EquipmentTypeRegistry>>,
}

impl AggregateLoader {
    pub fn new(config: LoaderConfig, store: Arc<dyn GraphStore>) -> Self {
        AggregateLoader {
            config,
            store,
            registry: None,
        }
    }

    /// Attach the registry used for equipment-type seeding.
    pub fn with_registry(mut self, registry: Arc<dyn EquipmentTypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Run the configured stages, stopping early on interrupt (ctrl-c).
    pub async fn load(&self) -> Result<()> {
        let stop = StopSignal::new();
        let interrupt = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, draining");
                interrupt.raise();
            }
        });
        self.load_with_stop(stop).await
    }

    /// Run the configured stages with an externally controlled stop signal.
    pub async fn load_with_stop(&self, stop: StopSignal) -> Result<()> {
        info!("loader started");
        let config = &self.config;

        if config.drop_schema {
            info!("dropping schema and data");
            self.store.drop_all().await.map_err(LoaderError::from)?;
        }

        if config.create_schema {
            for file in &config.schema_files {
                let schema = tokio::fs::read_to_string(file).await?;
                info!(file = %file.display(), "applying schema");
                self.store
                    .alter_schema(&schema)
                    .await
                    .map_err(LoaderError::from)?;
            }
        }

        if !(config.load_metadata || config.load_equipments || config.load_static_data) {
            return Ok(());
        }

        let mode = match &config.export_file {
            Some(_) => ResolveMode::Export(XidSet::new()),
            None => ResolveMode::Upsert,
        };
        let rdf_sink = match &config.export_file {
            Some(path) => Some(Arc::new(RdfSink::create(path).await?)),
            None => None,
        };
        let sink = match &rdf_sink {
            Some(sink) => CommitSink::Export(sink.clone()),
            None => CommitSink::Store(self.store.clone()),
        };

        let mut failures: Vec<String> = Vec::new();

        // Metadata is committed before anything reads it: equipment-type
        // seeding resolves source files against these nodes.
        if config.load_metadata {
            for file in &config.metadata_files {
                let path = config.skeleton_dir.join(file);
                info!(file = %path.display(), "loading metadata");
                match csv_columns(&path) {
                    Ok(columns) => {
                        let req = metadata_request(&mode, &path, &columns);
                        commit_with_retry(&sink, &req, &stop).await?;
                    }
                    Err(err) => {
                        warn!(file = %path.display(), %err, "cannot read skeleton file");
                        failures.push(format!("metadata:{file}:{err}"));
                    }
                }
            }
        }

        let mut eq_types: Vec<EquipmentType> = Vec::new();
        if config.load_default_equipment_types {
            let registry = self
                .registry
                .as_deref()
                .ok_or_else(|| LoaderError::Registry("no equipment-type registry configured".to_owned()))?;
            eq_types = seed_default_types(registry).await?;
        } else if config.load_equipments {
            eq_types = default_equipment_types();
        }

        let aborts = AbortCounter::new();
        let pipeline = CommitPipeline::start(
            sink,
            &PipelineConfig {
                committers: config.committers,
                queue_depth: config.committers,
            },
            stop.clone(),
            aborts.clone(),
        );
        let tx = pipeline.sender();

        let mut tracker = MasterTracker::load(&config.state_file);
        let mut producers: JoinSet<(String, String, FileCursor, Option<LoaderError>)> =
            JoinSet::new();

        for scope in &config.scopes {
            let dirs = match version_dirs(&config.master_dir.join(scope)) {
                Ok(dirs) => Arc::new(dirs),
                Err(err) => {
                    warn!(scope = %scope, %err, "cannot list version directories");
                    failures.push(format!("{scope}:{err}"));
                    continue;
                }
            };

            let mut jobs: Vec<(String, FileJob)> = Vec::new();
            if config.load_static_data {
                let static_sets = [
                    (&config.product_files, EntityKind::Products),
                    (&config.app_files, EntityKind::Applications),
                    (&config.inst_files, EntityKind::Instances),
                    (&config.acq_rights_files, EntityKind::AcquiredRights),
                    (&config.product_equipment_files, EntityKind::ProductEquipments),
                ];
                for (files, kind) in static_sets {
                    for file in files {
                        jobs.push((file.clone(), FileJob::Static(kind)));
                    }
                }
            }
            if config.load_equipments {
                for file in &config.equipment_files {
                    for eq_type in &eq_types {
                        if eq_type.source_name == *file {
                            jobs.push((file.clone(), FileJob::Equipment(eq_type.clone())));
                        }
                    }
                }
            }

            for (file, job) in jobs {
                let cursor = tracker.cursor(scope, &file);
                let runner = FileRunner {
                    ctx: TransformCtx::new(mode.clone()),
                    master_dir: config.master_dir.clone(),
                    scope: scope.clone(),
                    file: file.clone(),
                    job,
                    tx: tx.clone(),
                    stop: stop.clone(),
                    batch_size: config.batch_size,
                };
                let dirs = dirs.clone();
                producers.spawn(async move {
                    let (cursor, err) = runner.run(cursor, &dirs).await;
                    (runner.scope.clone(), runner.file.clone(), cursor, err)
                });
            }
        }
        drop(tx);

        let mut results: Vec<(String, String, FileCursor)> = Vec::new();
        while let Some(joined) = producers.join_next().await {
            match joined {
                Ok((scope, file, cursor, err)) => {
                    if let Some(err) = err {
                        warn!(scope = %scope, file = %file, %err, "file pass failed");
                        failures.push(format!("{scope}:{file}:{err}"));
                    }
                    results.push((scope, file, cursor));
                }
                // a panicked or cancelled producer left its file unfinished
                Err(err) => {
                    error!(%err, "file task died");
                    failures.push(format!("load:{err}"));
                }
            }
        }

        // All producers finished; wait for in-flight commits and retries
        // (an interrupt abandons them, leaving the abort count raised).
        let drained = pipeline.drain().await;

        if let Some(sink) = &rdf_sink {
            sink.finish().await?;
        }

        // Cursors move forward only when every handed-off batch was
        // confirmed committed. An abandoned batch means some file's rows
        // never landed, so all of this run's passes are replayed next time.
        let confirmed = drained.is_ok() && aborts.count() == 0;
        if confirmed {
            for (scope, file, cursor) in results {
                tracker.record(&scope, &file, cursor);
            }
        } else {
            warn!("unconfirmed commits, keeping previous load state");
        }
        // best effort, even on a failed run
        if let Err(err) = tracker.save(&config.state_file) {
            error!(state_file = %config.state_file.display(), %err, "cannot save state");
        }

        let stats = drained?;
        info!(
            commits = stats.commits,
            edges = stats.edges,
            retried = stats.retried,
            "load finished"
        );

        let outstanding = aborts.count();
        if outstanding != 0 {
            return Err(LoaderError::Aborted {
                count: outstanding,
                detail: failures.join(",\n"),
            });
        }
        if !failures.is_empty() {
            return Err(LoaderError::Aggregate(failures.join(",\n")));
        }
        Ok(())
    }
}
