//! Run orchestration: one linear validation pass per invocation.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::batch::next_batch;
use crate::checkpoint::{CheckpointStats, CheckpointStore};
use crate::config::Config;
use crate::services::{MediaServer, MovieItem};
use crate::validator::MovieValidator;

/// Counts for the movies processed by this invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: u64,
    pub ok: u64,
    pub defective: u64,
}

/// Terminal outcome of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The batch was validated to the end.
    Finished(BatchReport),
    /// Every movie was already tested in earlier runs.
    AlreadyComplete,
    /// The server returned an empty listing.
    NoMovies,
    /// Nothing untested in the listing, yet the checkpoint says the
    /// campaign is not complete (listing drift).
    NothingNew,
    /// Operator interrupt; every fully processed movie is checkpointed.
    Interrupted(BatchReport),
}

impl RunOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Finished(_) | RunOutcome::AlreadyComplete | RunOutcome::NothingNew => 0,
            RunOutcome::NoMovies => 1,
            RunOutcome::Interrupted(_) => 130,
        }
    }
}

/// Drive one validation pass: listing, total reconciliation, batch
/// selection, sequential per-movie validation, summary.
///
/// A listing failure is the only error this returns; everything past that
/// point degrades per movie and keeps going.
pub async fn run(
    config: &Config,
    server: Arc<dyn MediaServer>,
    store: &mut CheckpointStore,
    validator: &MovieValidator,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    info!(server = %config.base_url, "Fetching movie listing");
    let all_movies = server
        .list_movies()
        .await
        .context("Failed to fetch movie listing")?;

    if all_movies.is_empty() {
        warn!("No movies found in the library");
        return Ok(RunOutcome::NoMovies);
    }

    store.initialize_total(all_movies.len() as u64);

    if store.is_completed() {
        info!("All movies have already been tested");
        summarize(BatchReport::default(), store.stats());
        return Ok(RunOutcome::AlreadyComplete);
    }

    let all_ids: Vec<String> = all_movies.iter().map(|m| m.id.clone()).collect();
    let batch_ids = next_batch(&all_ids, store.checkpoint(), config.batch_size);

    if batch_ids.is_empty() {
        let stats = store.stats();
        warn!(
            tested = stats.tested,
            total = stats.total,
            "Nothing new to test, but the checkpoint is not complete (listing drift)"
        );
        return Ok(RunOutcome::NothingNew);
    }

    let batch: Vec<&MovieItem> = all_movies
        .iter()
        .filter(|m| batch_ids.iter().any(|id| *id == m.id))
        .collect();

    let stats = store.stats();
    let batch_number = stats.tested / config.batch_size as u64 + 1;
    let total_batches = stats.total.div_ceil(config.batch_size as u64);
    info!(
        batch = batch_number,
        of = total_batches,
        size = batch.len(),
        tested = stats.tested,
        total = stats.total,
        percentage = stats.percentage,
        "Starting batch"
    );

    let mut report = BatchReport::default();

    for (index, movie) in batch.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("Interrupted; progress up to the previous movie is saved");
            summarize(report, store.stats());
            return Ok(RunOutcome::Interrupted(report));
        }

        info!(position = index + 1, of = batch.len(), movie = %movie.name, "Testing");

        let is_ok = validator.validate(movie).await;
        store.mark_tested(&movie.id, !is_ok);

        report.processed += 1;
        if is_ok {
            report.ok += 1;
            info!(movie = %movie.name, "OK");
        } else {
            report.defective += 1;
            warn!(movie = %movie.name, "DEFECT");
        }
    }

    summarize(report, store.stats());
    Ok(RunOutcome::Finished(report))
}

/// Log the per-run counts and the cumulative campaign statistics.
fn summarize(report: BatchReport, stats: CheckpointStats) {
    info!(
        processed = report.processed,
        ok = report.ok,
        defective = report.defective,
        "Run summary"
    );
    info!(
        tested = stats.tested,
        total = stats.total,
        percentage = stats.percentage,
        defects = stats.defective,
        "Campaign progress"
    );
    if stats.remaining > 0 {
        info!(remaining = stats.remaining, "Run again to continue");
    } else {
        info!("All movies have been tested");
    }
}
