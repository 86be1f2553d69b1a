//! Durable validation progress: which movies were tested and which were
//! defective.
//!
//! The checkpoint is written through to disk after every single mutation.
//! Validating one movie can take seconds, so a crash mid-batch must never
//! lose results that were already collected.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Resumable campaign state, persisted as pretty-printed JSON.
///
/// `defect_films` is always a subset of `tested_films`. Both lists preserve
/// insertion order for diagnostics; set semantics are enforced by
/// [CheckpointStore::mark_tested].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub total_films: u64,
    #[serde(default)]
    pub tested_films: Vec<String>,
    #[serde(default)]
    pub defect_films: Vec<String>,
}

impl Checkpoint {
    /// Tested ids as a set for membership checks.
    pub fn tested_set(&self) -> HashSet<&str> {
        self.tested_films.iter().map(String::as_str).collect()
    }
}

/// Cumulative statistics derived from a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointStats {
    pub total: u64,
    pub tested: u64,
    pub ok: u64,
    pub defective: u64,
    pub percentage: f64,
    /// Signed: goes negative when the remote library shrank below the
    /// number of already-tested movies.
    pub remaining: i64,
}

/// Owns the checkpoint and the file behind it.
///
/// All mutations go through this type so every change hits disk before the
/// next movie is touched. The file is a single-writer resource; running two
/// instances of the tool against the same path races on it.
pub struct CheckpointStore {
    path: PathBuf,
    checkpoint: Checkpoint,
}

impl CheckpointStore {
    /// Load the checkpoint at `path`.
    ///
    /// A missing file starts a fresh campaign. An unreadable or unparsable
    /// file is logged and also starts fresh rather than failing the run.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let checkpoint = match read_checkpoint(&path) {
            Ok(Some(checkpoint)) => {
                info!(
                    tested = checkpoint.tested_films.len(),
                    total = checkpoint.total_films,
                    defects = checkpoint.defect_films.len(),
                    "Loaded checkpoint"
                );
                checkpoint
            }
            Ok(None) => {
                info!(path = %path.display(), "No checkpoint found, starting fresh");
                Checkpoint::default()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load checkpoint");
                warn!("Starting with a fresh checkpoint");
                Checkpoint::default()
            }
        };
        Self { path, checkpoint }
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Record the observed library size.
    ///
    /// A fresh checkpoint takes the observed total; a differing total from a
    /// later run overwrites it with a warning, without reconciling the
    /// tested/defect lists against the new listing. An equal total is a
    /// no-op and does not touch the file.
    pub fn initialize_total(&mut self, observed_total: u64) {
        if self.checkpoint.total_films == 0 {
            self.checkpoint.total_films = observed_total;
            self.save();
            info!(total = observed_total, "Initialized checkpoint total");
        } else if self.checkpoint.total_films != observed_total {
            warn!(
                previous = self.checkpoint.total_films,
                observed = observed_total,
                "Library size changed; updating total without reconciling tested movies"
            );
            self.checkpoint.total_films = observed_total;
            self.save();
        }
    }

    /// Mark `id` as tested, and as defective when `is_defect`.
    ///
    /// Insertion is idempotent; the checkpoint is persisted unconditionally
    /// after every call.
    pub fn mark_tested(&mut self, id: &str, is_defect: bool) {
        if !self.checkpoint.tested_films.iter().any(|t| t == id) {
            self.checkpoint.tested_films.push(id.to_string());
        }
        if is_defect && !self.checkpoint.defect_films.iter().any(|d| d == id) {
            self.checkpoint.defect_films.push(id.to_string());
        }
        self.save();
    }

    pub fn is_tested(&self, id: &str) -> bool {
        self.checkpoint.tested_films.iter().any(|t| t == id)
    }

    pub fn is_defective(&self, id: &str) -> bool {
        self.checkpoint.defect_films.iter().any(|d| d == id)
    }

    /// Whether every movie the campaign knows about has been tested.
    pub fn is_completed(&self) -> bool {
        self.checkpoint.total_films > 0
            && self.checkpoint.tested_films.len() as u64 >= self.checkpoint.total_films
    }

    pub fn stats(&self) -> CheckpointStats {
        let total = self.checkpoint.total_films;
        let tested = self.checkpoint.tested_films.len() as u64;
        let defective = self.checkpoint.defect_films.len() as u64;
        let percentage = if total == 0 {
            0.0
        } else {
            tested as f64 / total as f64 * 100.0
        };
        CheckpointStats {
            total,
            tested,
            // Saturating: a hand-edited file can break the subset invariant
            ok: tested.saturating_sub(defective),
            defective,
            percentage,
            remaining: total as i64 - tested as i64,
        }
    }

    /// Write-through save. Failures are logged and swallowed; in-memory
    /// state runs ahead of disk until the next successful save.
    fn save(&self) {
        match write_checkpoint(&self.path, &self.checkpoint) {
            Ok(()) => debug!("Checkpoint saved"),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to save checkpoint");
            }
        }
    }
}

fn read_checkpoint(path: &Path) -> Result<Option<Checkpoint>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).context("Failed to read checkpoint file")?;
    let checkpoint = serde_json::from_str(&raw).context("Failed to parse checkpoint file")?;
    Ok(Some(checkpoint))
}

fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create checkpoint directory")?;
        }
    }
    let raw = serde_json::to_string_pretty(checkpoint).context("Failed to serialize checkpoint")?;
    fs::write(path, raw).context("Failed to write checkpoint file")?;
    Ok(())
}
