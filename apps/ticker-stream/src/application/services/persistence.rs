//! Persistence Writers
//!
//! Background tasks that mirror the list and investments into a
//! [`SnapshotStore`]. The list writer is throttled: changes arriving faster
//! than the write interval coalesce into one write of the latest list.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::list_store::ListSnapshot;
use crate::application::ports::SnapshotStore;
use crate::domain::market::Investment;
use crate::infrastructure::metrics;

/// Write the list whenever it changes, at most once per `min_interval`.
///
/// Empty lists are never written. On cancellation a change that is still
/// waiting out the interval is written before returning.
pub async fn run_list_writer(
    storage: Arc<dyn SnapshotStore>,
    mut list_rx: watch::Receiver<ListSnapshot>,
    min_interval: Duration,
    cancel: CancellationToken,
) {
    let mut last_write: Option<Instant> = None;
    // `changed()` marks the value seen, so a change waiting out the interval
    // is tracked here rather than through `has_changed()`.
    let mut pending = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = list_rx.changed() => {
                if changed.is_err() {
                    tracing::debug!("List publisher dropped, list writer stopped");
                    return;
                }
                pending = true;
            }
        }

        if let Some(at) = last_write {
            let ready_at = at + min_interval;
            if Instant::now() < ready_at {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep_until(ready_at) => {}
                }
            }
        }

        let list = list_rx.borrow_and_update().clone();
        write_list(storage.as_ref(), &list).await;
        pending = false;
        last_write = Some(Instant::now());
    }

    if pending || list_rx.has_changed().unwrap_or(false) {
        let list = list_rx.borrow_and_update().clone();
        write_list(storage.as_ref(), &list).await;
    }
    tracing::debug!("List writer stopped");
}

async fn write_list(storage: &dyn SnapshotStore, list: &ListSnapshot) {
    if list.is_empty() {
        return;
    }
    match storage.save_list(list).await {
        Ok(()) => {
            tracing::debug!(rows = list.len(), "Stored list");
            metrics::record_persistence_write("list", true);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to store list");
            metrics::record_persistence_write("list", false);
        }
    }
}

/// Write investments whenever they are replaced with a non-empty list.
pub async fn run_investments_writer(
    storage: Arc<dyn SnapshotStore>,
    mut investments_rx: watch::Receiver<Arc<[Investment]>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = investments_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let investments = investments_rx.borrow_and_update().clone();
        if investments.is_empty() {
            continue;
        }
        match storage.save_investments(&investments).await {
            Ok(()) => {
                tracing::debug!(count = investments.len(), "Stored investments");
                metrics::record_persistence_write("investments", true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to store investments");
                metrics::record_persistence_write("investments", false);
            }
        }
    }
    tracing::debug!("Investments writer stopped");
}
