//! CSV file passes: one producer per (scope, file), replaying owed version
//! directories in order and shipping batches to the commit pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use samgraph_core::{MutationRequest, NQuad, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::equipment::{BoundType, EquipmentType};
use crate::error::{LoaderError, Result};
use crate::pipeline::{Batcher, StopSignal};
use crate::state::{row_timestamp, FileCursor};
use crate::transform::{EntityKind, TransformCtx};

/// Read and trim the header row of a CSV file.
pub fn csv_columns(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)?;
    let columns = reader
        .headers()?
        .iter()
        .map(|c| c.trim().to_owned())
        .collect();
    Ok(columns)
}

/// What one file pass produces.
pub enum FileJob {
    /// Fixed-schema entity file
    Static(EntityKind),
    /// Equipment file driven by a dynamic type
    Equipment(EquipmentType),
}

/// Runs every owed version of one (scope, file) pair.
pub struct FileRunner {
    pub ctx: TransformCtx,
    pub master_dir: PathBuf,
    pub scope: String,
    pub file: String,
    pub job: FileJob,
    pub tx: mpsc::Sender<MutationRequest>,
    pub stop: StopSignal,
    pub batch_size: usize,
}

impl FileRunner {
    /// Walk the version directories this cursor still owes, in order. The
    /// updated cursor is always returned so the tracker can persist partial
    /// progress; the first error ends the walk.
    pub async fn run(
        &self,
        mut cursor: FileCursor,
        dirs: &[String],
    ) -> (FileCursor, Option<LoaderError>) {
        let owed: Vec<String> = cursor.replay_dirs(dirs).to_vec();
        for version in owed {
            cursor.begin_version(&version);
            let path = self
                .master_dir
                .join(&self.scope)
                .join(&version)
                .join(&self.file);
            info!(file = %path.display(), scope = %self.scope, "started loading");
            let mut batcher = Batcher::new(self.tx.clone(), self.stop.clone(), self.batch_size);
            let outcome = match &self.job {
                FileJob::Static(kind) => {
                    load_static_pass(&self.ctx, *kind, &path, &self.scope, &cursor, &mut batcher)
                        .await
                }
                FileJob::Equipment(eq_type) => {
                    load_equipment_pass(&self.ctx, eq_type, &path, &self.scope, &cursor, &mut batcher)
                        .await
                }
            };
            info!(file = %path.display(), scope = %self.scope, "end loading");
            match outcome {
                Ok(max_seen) => cursor.finish_version(max_seen),
                Err(err) => return (cursor, Some(err)),
            }
        }
        (cursor, None)
    }
}

/// One pass over a fixed-schema entity file. Returns the newest row
/// timestamp taken during the pass.
pub async fn load_static_pass(
    ctx: &TransformCtx,
    kind: EntityKind,
    path: &Path,
    scope: &str,
    cursor: &FileCursor,
    batcher: &mut Batcher,
) -> Result<DateTime<Utc>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|c| c.trim().to_owned())
        .collect();
    let xid_idx = columns
        .iter()
        .position(|c| c == kind.xid_column())
        .ok_or_else(|| LoaderError::MissingXidColumn {
            file: path.display().to_string(),
            column: kind.xid_column().to_owned(),
        })?;
    let updated_idx = columns.iter().position(|c| c == "updated");
    let created_idx = columns.iter().position(|c| c == "created");
    let transform = kind.transform_fn();

    let mut max_seen = DateTime::<Utc>::default();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                warn!(file = %path.display(), %err, "skipping unreadable row");
                continue;
            }
        };
        let row: Vec<String> = record.iter().map(|c| c.trim().to_owned()).collect();
        let Some(xid) = row.get(xid_idx) else {
            warn!(file = %path.display(), "row has no xid column, skipping");
            continue;
        };
        if xid.is_empty() {
            warn!(file = %path.display(), column = kind.xid_column(), "empty xid, skipping row");
            continue;
        }

        match row_timestamp(&row, updated_idx, created_idx) {
            Ok(ts) => {
                if !cursor.should_process(ts) {
                    continue;
                }
                if ts > max_seen {
                    max_seen = ts;
                }
            }
            // no usable timestamp: the row counts as dirty
            Err(err) => {
                warn!(file = %path.display(), %err, "cannot read row timestamp, treating as dirty");
            }
        }

        let mut out = transform(ctx, &columns, &row, xid_idx);
        if out.scope_edge {
            let subject = out.subject.clone();
            out.nquads
                .push(NQuad::value(subject, "scopes", Value::str(scope)));
        }
        batcher.push(out).await?;
    }
    batcher.flush().await?;
    Ok(max_seen)
}

/// One pass over an equipment file, driven by its equipment type.
pub async fn load_equipment_pass(
    ctx: &TransformCtx,
    eq_type: &EquipmentType,
    path: &Path,
    scope: &str,
    cursor: &FileCursor,
    batcher: &mut Batcher,
) -> Result<DateTime<Utc>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|c| c.trim().to_owned())
        .collect();
    let bound = BoundType::bind(eq_type, &columns, &path.display().to_string())?;
    let updated_idx = columns.iter().position(|c| c == "updated");
    let created_idx = columns.iter().position(|c| c == "created");

    let mut max_seen = DateTime::<Utc>::default();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                warn!(file = %path.display(), %err, "skipping unreadable row");
                continue;
            }
        };
        let row: Vec<String> = record.iter().map(|c| c.trim().to_owned()).collect();
        let Some(pk) = row.get(bound.pk_idx()) else {
            warn!(file = %path.display(), "primary key index is not in row, skipping");
            continue;
        };
        if pk.is_empty() {
            warn!(file = %path.display(), kind = %eq_type.kind, "primary key is empty, skipping row");
            continue;
        }

        match row_timestamp(&row, updated_idx, created_idx) {
            Ok(ts) => {
                if !cursor.should_process(ts) {
                    continue;
                }
                if ts > max_seen {
                    max_seen = ts;
                }
            }
            Err(err) => {
                warn!(file = %path.display(), %err, "cannot read row timestamp, treating as dirty");
            }
        }

        let mut out = bound.transform_row(&ctx.mode, &row);
        if out.scope_edge {
            let subject = out.subject.clone();
            out.nquads
                .push(NQuad::value(subject, "scopes", Value::str(scope)));
        }
        batcher.push(out).await?;
    }
    batcher.flush().await?;
    Ok(max_seen)
}
