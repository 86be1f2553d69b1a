//! Batch selection over the freshly fetched listing.

use crate::checkpoint::Checkpoint;

/// Pick the next batch of untested ids.
///
/// Filters `all_ids` preserving the listing order (the server sorts by name)
/// and truncates to `batch_size`. Pure: identical inputs always produce
/// identical output.
pub fn next_batch(all_ids: &[String], checkpoint: &Checkpoint, batch_size: usize) -> Vec<String> {
    let tested = checkpoint.tested_set();
    all_ids
        .iter()
        .filter(|id| !tested.contains(id.as_str()))
        .take(batch_size)
        .cloned()
        .collect()
}
