use crate::catalog;
use crate::store::CounterStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// A video id with its recorded exposure count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoExposure {
    /// Video identifier
    #[serde(rename = "videoId")]
    pub video_id: String,
    /// Number of recorded exposures
    pub count: u64,
}

/// Exposure tracking over a [`CounterStore`].
///
/// Counts balance which KOL video the landing page rotates in first, so
/// they are best-effort telemetry: every operation degrades to safe
/// defaults instead of surfacing store failures to its caller.
pub struct ExposureTracker {
    store: Arc<dyn CounterStore>,
}

impl ExposureTracker {
    /// Create a tracker over the given counter store
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Full counter map, covering every catalog video.
    ///
    /// An absent key and a failed read both fall back to the zeroed
    /// catalog map. Whatever map is obtained is reconciled against the
    /// catalog: missing catalog ids are inserted at 0, ids no longer in
    /// the catalog are kept untouched.
    pub async fn all_counts(&self) -> HashMap<String, u64> {
        let mut counts = match self.store.read_all().await {
            Ok(Some(counts)) => counts,
            Ok(None) => {
                debug!("No persisted exposure counts, starting from zero");
                catalog::zeroed_counts()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read exposure counts, serving zeroed defaults");
                metrics::counter!("exposure.reads.degraded").increment(1);
                catalog::zeroed_counts()
            }
        };

        for id in catalog::catalog_ids() {
            counts.entry(id.to_string()).or_insert(0);
        }

        counts
    }

    /// Record one exposure per occurrence of each id in `video_ids`.
    ///
    /// Reads the full map, applies the increments (duplicates each count,
    /// ids outside the catalog get an entry created), and writes the whole
    /// map back. The read-modify-write is not atomic: two concurrent
    /// batches can overwrite each other and the losing batch is dropped.
    ///
    /// Returns whether the updated map was persisted. A failed write is
    /// logged and the batch dropped; this method never errors.
    #[instrument(skip(self, video_ids), fields(batch_size = video_ids.len()))]
    pub async fn record_exposures(&self, video_ids: &[String]) -> bool {
        if video_ids.is_empty() {
            return true;
        }

        let mut counts = self.all_counts().await;

        for id in video_ids {
            *counts.entry(id.clone()).or_insert(0) += 1;
        }

        match self.store.write_all(&counts).await {
            Ok(()) => {
                debug!(recorded = video_ids.len(), "Exposure batch persisted");
                metrics::counter!("exposure.increments.applied")
                    .increment(video_ids.len() as u64);
                true
            }
            Err(e) => {
                error!(
                    error = %e,
                    dropped = video_ids.len(),
                    "Failed to persist exposure counts, batch dropped"
                );
                metrics::counter!("exposure.increments.dropped")
                    .increment(video_ids.len() as u64);
                false
            }
        }
    }

    /// Counter map flattened and sorted so the least-exposed videos come
    /// first.
    ///
    /// Equal counts order by catalog declaration; ids outside the catalog
    /// sort after every catalog entry, ordered by id.
    pub async fn sorted_by_exposure(&self) -> Vec<VideoExposure> {
        let counts = self.all_counts().await;

        let mut videos: Vec<VideoExposure> = counts
            .into_iter()
            .map(|(video_id, count)| VideoExposure { video_id, count })
            .collect();

        videos.sort_by(|a, b| {
            a.count
                .cmp(&b.count)
                .then_with(|| rotation_rank(&a.video_id).cmp(&rotation_rank(&b.video_id)))
        });

        videos
    }
}

/// Deterministic tie-break key: catalog entries by declaration order,
/// everything else after them by id.
fn rotation_rank(id: &str) -> (usize, &str) {
    match catalog::catalog_rank(id) {
        Some(rank) => (rank, ""),
        None => (usize::MAX, id),
    }
}
