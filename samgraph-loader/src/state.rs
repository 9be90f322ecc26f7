//! Incremental load state, persisted between runs.
//!
//! The tracker remembers, per (scope, file), the last version directory
//! replayed, the high-water `updatedOn` timestamp and the pass outcome. A
//! missing or unreadable state file means everything is loaded from scratch.
//!
//! A file's watermark only advances after a pass completed without a forced
//! stop, so rows handed to abandoned in-flight batches are re-read on the
//! next run rather than lost.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Outcome of the last pass over a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    /// Never loaded; every row is taken regardless of timestamps
    #[default]
    Created,
    /// Loaded before; only rows newer than the watermark are taken
    Incremental,
    /// Last pass errored; its version directory is replayed
    Failed,
}

/// Per-file load position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCursor {
    #[serde(rename = "updatedOn", default)]
    pub updated_on: DateTime<Utc>,
    #[serde(default)]
    pub state: TrackerState,
    /// Last version directory visited
    #[serde(default)]
    pub version: String,
}

impl FileCursor {
    /// Whether a row with this timestamp must be (re)loaded.
    pub fn should_process(&self, ts: DateTime<Utc>) -> bool {
        self.state == TrackerState::Created || ts > self.updated_on
    }

    /// The version directories still owed to this file, given the full
    /// ordered list for its scope.
    pub fn replay_dirs<'v>(&self, dirs: &'v [String]) -> &'v [String] {
        let Some(idx) = dirs.iter().position(|d| *d == self.version) else {
            return dirs;
        };
        match self.state {
            TrackerState::Created => dirs,
            TrackerState::Incremental => &dirs[idx + 1..],
            TrackerState::Failed => &dirs[idx..],
        }
    }

    /// Mark a version pass as started; the state stays Failed until the pass
    /// finishes, so a crash replays this directory. This also puts the
    /// watermark into effect for a Created cursor that carries one: forcing
    /// a full reload requires resetting `updated_on`, not just the state.
    pub fn begin_version(&mut self, version: &str) {
        self.version = version.to_owned();
        self.state = TrackerState::Failed;
    }

    /// Mark the current version pass finished, advancing the watermark.
    pub fn finish_version(&mut self, max_seen: DateTime<Utc>) {
        if max_seen > self.updated_on {
            self.updated_on = max_seen;
        }
        self.state = TrackerState::Incremental;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeTracker {
    #[serde(default)]
    pub files: BTreeMap<String, FileCursor>,
}

/// All load positions, keyed scope then file name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterTracker {
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeTracker>,
}

impl MasterTracker {
    /// Read the tracker from disk; a missing or corrupt file falls back to
    /// an empty tracker, forcing a full load.
    pub fn load(path: &Path) -> Self {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                warn!(state_file = %path.display(), %err,
                    "state file not readable, all data will be processed");
                return MasterTracker::default();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(tracker) => tracker,
            Err(err) => {
                warn!(state_file = %path.display(), %err,
                    "state file not parseable, all data will be processed");
                MasterTracker::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Hand out the cursor for one file; absent entries start as Created.
    pub fn cursor(&self, scope: &str, file: &str) -> FileCursor {
        self.scopes
            .get(scope)
            .and_then(|s| s.files.get(file))
            .cloned()
            .unwrap_or_default()
    }

    /// Store back a cursor returned from a file pass.
    pub fn record(&mut self, scope: &str, file: &str, cursor: FileCursor) {
        self.scopes
            .entry(scope.to_owned())
            .or_default()
            .files
            .insert(file.to_owned(), cursor);
    }
}

/// List the version directories under one scope, ordered numerically by
/// their `v<N>` name. A directory that does not follow the naming sorts
/// first and is logged.
pub fn version_dirs(scope_dir: &Path) -> Result<Vec<String>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(scope_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    dirs.sort_by_key(|d| {
        d.trim_start_matches('v').parse::<u64>().unwrap_or_else(|err| {
            warn!(dir = %d, %err, "version directory name is not v<N>");
            0
        })
    });
    Ok(dirs)
}

/// Timestamp deciding whether a row is dirty: the `updated` column when
/// present and non-empty, otherwise `created`. An unparseable or missing
/// value is an error; the caller treats such rows as dirty.
pub fn row_timestamp(
    row: &[String],
    updated_idx: Option<usize>,
    created_idx: Option<usize>,
) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    let raw = [updated_idx, created_idx]
        .into_iter()
        .flatten()
        .filter_map(|idx| row.get(idx))
        .find(|v| !v.is_empty())
        .map(String::as_str)
        .unwrap_or("");
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn created_state_processes_everything() {
        let cursor = FileCursor::default();
        assert!(cursor.should_process(ts("2000-01-01T00:00:00Z")));
    }

    #[test]
    fn incremental_state_filters_by_watermark() {
        let cursor = FileCursor {
            updated_on: ts("2024-03-01T00:00:00Z"),
            state: TrackerState::Incremental,
            version: "v1".to_owned(),
        };
        assert!(!cursor.should_process(ts("2024-02-01T00:00:00Z")));
        assert!(!cursor.should_process(ts("2024-03-01T00:00:00Z")));
        assert!(cursor.should_process(ts("2024-03-02T00:00:00Z")));
    }

    #[test]
    fn replay_rules_follow_last_state() {
        let dirs: Vec<String> = ["v1", "v2", "v3"].iter().map(|s| (*s).to_owned()).collect();
        let mut cursor = FileCursor {
            version: "v2".to_owned(),
            state: TrackerState::Incremental,
            ..FileCursor::default()
        };
        assert_eq!(cursor.replay_dirs(&dirs), &dirs[2..]);
        cursor.state = TrackerState::Failed;
        assert_eq!(cursor.replay_dirs(&dirs), &dirs[1..]);
        cursor.state = TrackerState::Created;
        assert_eq!(cursor.replay_dirs(&dirs), &dirs[..]);
        cursor.version = "v9".to_owned();
        cursor.state = TrackerState::Incremental;
        assert_eq!(cursor.replay_dirs(&dirs), &dirs[..]);
    }

    #[test]
    fn begin_version_puts_an_existing_watermark_into_effect() {
        let mut cursor = FileCursor {
            updated_on: ts("2024-03-01T00:00:00Z"),
            state: TrackerState::Created,
            version: String::new(),
        };
        assert!(cursor.should_process(ts("2020-01-01T00:00:00Z")));

        cursor.begin_version("v1");
        assert!(!cursor.should_process(ts("2020-01-01T00:00:00Z")));
        assert!(cursor.should_process(ts("2024-03-02T00:00:00Z")));
    }

    #[test]
    fn watermark_is_monotonic() {
        let mut cursor = FileCursor::default();
        cursor.begin_version("v1");
        assert_eq!(cursor.state, TrackerState::Failed);
        cursor.finish_version(ts("2024-03-01T00:00:00Z"));
        cursor.begin_version("v2");
        cursor.finish_version(ts("2024-01-01T00:00:00Z"));
        assert_eq!(cursor.updated_on, ts("2024-03-01T00:00:00Z"));
        assert_eq!(cursor.state, TrackerState::Incremental);
    }

    #[test]
    fn roundtrips_through_json() {
        let mut tracker = MasterTracker::default();
        tracker.record(
            "france",
            "products.csv",
            FileCursor {
                updated_on: ts("2024-03-01T00:00:00Z"),
                state: TrackerState::Incremental,
                version: "v2".to_owned(),
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tracker.save(&path).unwrap();
        assert_eq!(MasterTracker::load(&path), tracker);
    }

    #[test]
    fn missing_state_file_means_full_load() {
        let tracker = MasterTracker::load(Path::new("/nonexistent/state.json"));
        assert_eq!(tracker.cursor("s", "f").state, TrackerState::Created);
    }

    #[test]
    fn version_dirs_sort_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["v10", "v2", "v1"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        assert_eq!(version_dirs(dir.path()).unwrap(), ["v1", "v2", "v10"]);
    }

    #[test]
    fn row_timestamp_prefers_updated_over_created() {
        let row: Vec<String> = ["x", "2024-03-02T00:00:00Z", "2024-01-01T00:00:00Z"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let t = row_timestamp(&row, Some(1), Some(2)).unwrap();
        assert_eq!(t, ts("2024-03-02T00:00:00Z"));

        let row: Vec<String> = ["x", "", "2024-01-01T00:00:00Z"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let t = row_timestamp(&row, Some(1), Some(2)).unwrap();
        assert_eq!(t, ts("2024-01-01T00:00:00Z"));

        assert!(row_timestamp(&row, None, None).is_err());
    }
}
