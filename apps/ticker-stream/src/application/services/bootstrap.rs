//! Start-up Loading
//!
//! Fills the market view before the feed connects: a fresh stored list is
//! restored with its prices, otherwise the catalog is fetched and seeded.
//! Stored investments are loaded either way.

use crate::application::ports::{CatalogError, CatalogSource, SnapshotStore};
use crate::application::services::MarketView;

/// Failure bootstrapping the list.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// No usable stored list and the catalog could not be fetched.
    #[error("failed to load instrument catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// Where the list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
    /// Restored from a stored list that had not expired.
    Storage,
    /// Seeded from a fresh catalog fetch.
    Catalog,
}

/// Summary of a completed bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Source of the list.
    pub source: ListSource,
    /// Rows in the list after loading.
    pub rows: usize,
    /// Investments loaded from storage.
    pub investments: usize,
    /// Ids to subscribe to, in list order.
    pub product_ids: Vec<String>,
}

/// Load the list and investments into `view`.
///
/// Storage failures are logged and treated as "nothing stored". A catalog
/// failure is returned and leaves the list unseeded.
///
/// # Errors
///
/// Returns [`BootstrapError::Catalog`] when no fresh list is stored and the
/// catalog fetch fails.
pub async fn bootstrap(
    view: &MarketView,
    catalog: &dyn CatalogSource,
    storage: &dyn SnapshotStore,
) -> Result<BootstrapReport, BootstrapError> {
    let stored = match storage.load_list().await {
        Ok(stored) => stored.filter(|rows| !rows.is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read stored list, falling back to catalog");
            None
        }
    };

    let source = if let Some(rows) = stored {
        view.restore(rows);
        ListSource::Storage
    } else {
        let entries = catalog.fetch_catalog().await?;
        view.seed(entries);
        ListSource::Catalog
    };

    let investments = match storage.load_investments().await {
        Ok(Some(investments)) => investments,
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read stored investments, starting with none");
            Vec::new()
        }
    };
    let investment_count = investments.len();
    if investment_count > 0 {
        view.set_investments(investments);
    }

    let snapshot = view.list_snapshot();
    let product_ids = snapshot.iter().map(|row| row.id.clone()).collect();

    tracing::info!(
        source = ?source,
        rows = snapshot.len(),
        investments = investment_count,
        "Bootstrap complete"
    );

    Ok(BootstrapReport {
        source,
        rows: snapshot.len(),
        investments: investment_count,
        product_ids,
    })
}
