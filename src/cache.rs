//! Staleness detection for incremental generation.
//!
//! Generation is the expensive step of the pipeline — every registered
//! asset gets minified, compressed, and escaped. This module lets
//! [`Embedder::done`](crate::Embedder::done) skip all of it when nothing
//! changed since the previous run.
//!
//! # Design
//!
//! Two independent signals force regeneration, and either alone is enough:
//!
//! - **Modification times**: if any registered path is newer than the
//!   generated unit, the unit is stale. Only the registered paths
//!   themselves are stat'ed, mirroring how the registration list is the
//!   unit of change tracking.
//! - **The snapshot**: an ordered list of the registration paths consumed
//!   by the previous generation, persisted next to the generated unit.
//!   A different list — extra paths, missing paths, or merely a different
//!   order — means the generated unit describes the wrong set of assets,
//!   even if no file on disk changed. Order matters because the generated
//!   unit writes records in registration order.
//!
//! A missing, corrupt, or version-mismatched snapshot reads as "absent"
//! and forces regeneration; it is never an error, the same way a corrupt
//! cache manifest just means a cold cache.
//!
//! Regeneration is all-or-nothing: there is no incremental merge, so a
//! single stale input rewrites every record.

use crate::config::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

/// Name of the snapshot file within the generated unit's directory.
pub(crate) const SNAPSHOT_FILENAME: &str = ".inlay-snapshot.json";

/// Version of the snapshot format. Bump to invalidate existing snapshots
/// when the format changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Outcome of the staleness check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Freshness {
    /// The check has not run yet this process.
    #[default]
    Unchecked,
    /// Prior generated output is current; leave it untouched.
    Skip,
    /// Output is missing or stale; the generator must run.
    Regenerate,
}

#[derive(Error, Debug)]
#[error("could not stat {path}: {source}")]
pub struct StaleError {
    pub path: String,
    #[source]
    pub source: io::Error,
}

/// Ordered list of registration paths consumed by the previous generation.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    version: u32,
    paths: Vec<String>,
}

impl Snapshot {
    pub(crate) fn new(paths: &[String]) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            paths: paths.to_vec(),
        }
    }

    /// Load from the generated unit's directory. `None` if absent,
    /// unparsable, or from a different format version.
    pub(crate) fn load(dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(dir.join(SNAPSHOT_FILENAME)).ok()?;
        let snapshot: Self = serde_json::from_str(&content).ok()?;
        (snapshot.version == SNAPSHOT_VERSION).then_some(snapshot)
    }

    /// Save to the generated unit's directory.
    pub(crate) fn save(&self, dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(SNAPSHOT_FILENAME), json)
    }

    /// Order-sensitive comparison against the current registration list.
    pub(crate) fn matches(&self, paths: &[String]) -> bool {
        self.paths == paths
    }
}

/// Decide whether generation must run for the current registration list.
///
/// The caller has already handled the empty-registry case (nothing to do)
/// and single-file mode (always regenerates); this covers the remaining
/// transitions:
///
/// 1. Generated unit missing → [`Freshness::Regenerate`].
/// 2. Any registered path newer than the unit → `Regenerate`.
/// 3. Snapshot absent or differing from `pending` (length or order) →
///    `Regenerate`.
/// 4. Otherwise → [`Freshness::Skip`].
pub(crate) fn assess(config: &EmbedConfig, pending: &[String]) -> Result<Freshness, StaleError> {
    let unit = config.unit_path();
    let unit_mtime = match std::fs::metadata(&unit) {
        Ok(meta) => modified(&meta, &unit)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Freshness::Regenerate),
        Err(source) => {
            return Err(StaleError {
                path: unit.display().to_string(),
                source,
            });
        }
    };

    for path in pending {
        let full = config.root.join(path);
        let meta = std::fs::metadata(&full).map_err(|source| StaleError {
            path: path.clone(),
            source,
        })?;
        if modified(&meta, &full)? > unit_mtime {
            return Ok(Freshness::Regenerate);
        }
    }

    match Snapshot::load(&config.snapshot_dir()) {
        Some(snapshot) if snapshot.matches(pending) => Ok(Freshness::Skip),
        _ => Ok(Freshness::Regenerate),
    }
}

fn modified(meta: &std::fs::Metadata, path: &Path) -> Result<SystemTime, StaleError> {
    meta.modified().map_err(|source| StaleError {
        path: path.display().to_string(),
        source,
    })
}
