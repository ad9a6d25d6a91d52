//! In-process history slot.
//!
//! Holds a single entry; every write replaces it wholesale. Concurrent
//! writers race with last-write-wins, which is fine for a soft cache.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::HistoryStore;
use crate::error::{Error, Result};
use crate::plex::PlaybackRecord;

#[derive(Debug, Clone)]
struct Slot {
    key: String,
    items: Vec<PlaybackRecord>,
    written_at: DateTime<Utc>,
    ttl: Duration,
}

impl Slot {
    fn is_valid(&self) -> bool {
        Utc::now()
            .signed_duration_since(self.written_at)
            .to_std()
            .is_ok_and(|age| age < self.ttl)
    }
}

#[derive(Default)]
pub struct LocalStore {
    slot: Mutex<Option<Slot>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for LocalStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<PlaybackRecord>>> {
        let slot = self.slot.lock().map_err(|e| Error::Cache(format!("lock poisoned: {e}")))?;
        Ok(slot
            .as_ref()
            .filter(|s| s.key == key && s.is_valid() && !s.items.is_empty())
            .map(|s| s.items.clone()))
    }

    async fn put(&self, key: &str, items: &[PlaybackRecord], ttl: Duration) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|e| Error::Cache(format!("lock poisoned: {e}")))?;
        *slot = Some(Slot {
            key: key.to_string(),
            items: items.to_vec(),
            written_at: Utc::now(),
            ttl,
        });
        Ok(())
    }

    /// Clears the slot whatever key it holds.
    async fn invalidate(&self, _key: &str) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|e| Error::Cache(format!("lock poisoned: {e}")))?;
        *slot = None;
        Ok(())
    }
}
