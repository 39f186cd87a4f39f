//! File Snapshot Store
//!
//! [`SnapshotStore`] backed by one JSON file per key in a directory:
//!
//! - `stored-list-data`: `{"list": [ListItem], "storageDate": <epoch ms>}`
//! - `investments`: `[Investment]`
//!
//! Writes go to a sibling temp file and are renamed into place, so a crash
//! mid-write leaves the previous snapshot intact.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::application::ports::{PersistenceError, SnapshotStore};
use crate::domain::market::{Investment, ListItem};

/// File name of the stored list.
pub const LIST_DATA_KEY: &str = "stored-list-data";

/// File name of the stored investments.
pub const INVESTMENTS_KEY: &str = "investments";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredListData {
    list: Vec<ListItem>,
    storage_date: i64,
}

/// Snapshot files in a single directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    expiry: Duration,
}

impl FileSnapshotStore {
    /// Create a store in `dir`. Stored lists older than `expiry` are ignored.
    ///
    /// The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, expiry: Duration) -> Self {
        Self {
            dir: dir.into(),
            expiry,
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.path(key);
        let staging = self.path(&format!("{key}.tmp"));
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn load_list_at(&self, now_ms: i64) -> Result<Option<Vec<ListItem>>, PersistenceError> {
        let Some(bytes) = self.read(LIST_DATA_KEY).await? else {
            return Ok(None);
        };
        let stored: StoredListData = serde_json::from_slice(&bytes)?;

        let age_ms = now_ms.saturating_sub(stored.storage_date);
        let expiry_ms = i64::try_from(self.expiry.as_millis()).unwrap_or(i64::MAX);
        if age_ms > expiry_ms {
            tracing::debug!(age_ms, expiry_ms, "Stored list expired");
            return Ok(None);
        }

        Ok(Some(stored.list))
    }

    async fn save_list_at(&self, list: &[ListItem], now_ms: i64) -> Result<(), PersistenceError> {
        let stored = StoredListData {
            list: list.to_vec(),
            storage_date: now_ms,
        };
        self.write(LIST_DATA_KEY, serde_json::to_vec(&stored)?).await
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load_list(&self) -> Result<Option<Vec<ListItem>>, PersistenceError> {
        self.load_list_at(Utc::now().timestamp_millis()).await
    }

    async fn save_list(&self, list: &[ListItem]) -> Result<(), PersistenceError> {
        self.save_list_at(list, Utc::now().timestamp_millis()).await
    }

    async fn load_investments(&self) -> Result<Option<Vec<Investment>>, PersistenceError> {
        let Some(bytes) = self.read(INVESTMENTS_KEY).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save_investments(&self, investments: &[Investment]) -> Result<(), PersistenceError> {
        self.write(INVESTMENTS_KEY, serde_json::to_vec(investments)?)
            .await
    }
}
