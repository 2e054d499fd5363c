use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::model::Ms;
use crate::store::{now_ms, Store};

/// Confirm every draft whose deadline is at or before `now`.
/// Returns how many bookings changed state.
pub async fn confirm_due(store: &Store, now: Ms) -> usize {
    let due = store.collect_due_confirmations(now);
    if due.is_empty() {
        return 0;
    }
    let results = join_all(due.iter().map(|(id, _)| store.confirm_booking(*id))).await;
    let mut confirmed = 0;
    for ((id, user), result) in due.iter().zip(results) {
        match result {
            Ok(true) => {
                confirmed += 1;
                info!(booking = %id, user = %user, "booking confirmed");
            }
            Ok(false) => {}
            // Deleted between collection and confirmation.
            Err(e) => debug!(booking = %id, "confirm skipped: {e}"),
        }
    }
    confirmed
}

/// Periodically confirm due drafts.
pub async fn run_confirmer(store: Arc<Store>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        confirm_due(&store, now_ms()).await;
    }
}

/// Compact the WAL once enough appends have piled up since the last one.
pub async fn run_compactor(store: Arc<Store>, every: Duration, threshold: u64) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if store.wal_appends_since_compact().await < threshold {
            continue;
        }
        if let Err(e) = store.compact_wal().await {
            warn!("WAL compaction failed: {e}");
        }
        store.notify.prune();
    }
}
