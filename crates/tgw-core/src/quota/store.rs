//! Persistence port for quota state, plus the two stock adapters.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::{Error, Result};
use crate::quota::QuotaRecord;

/// One admitted request, kept for the evidentiary log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptEntry {
    pub identity: String,
    pub sent_at: DateTime<Utc>,
}

/// Storage behind the quota tracker. Implementations must be safe to call
/// concurrently; the tracker serializes calls per identity but not across
/// identities.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn load(&self, identity: &str) -> Result<Option<QuotaRecord>>;

    async fn save(&self, record: &QuotaRecord) -> Result<()>;

    /// Upsert the hourly limit only. An unknown identity gets a fresh
    /// record with a window starting at `now` and a zero count.
    async fn set_limit(&self, identity: &str, limit: u32, now: DateTime<Utc>) -> Result<()>;

    async fn record_attempt(&self, identity: &str, at: DateTime<Utc>) -> Result<()>;

    /// Delete attempt entries strictly older than `cutoff`; returns how
    /// many were removed.
    async fn purge_attempts_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    records: HashMap<String, QuotaRecord>,
    attempts: Vec<AttemptEntry>,
}

impl StoreState {
    fn set_limit(&mut self, identity: &str, limit: u32, now: DateTime<Utc>) {
        match self.records.get_mut(identity) {
            Some(record) => record.hourly_limit = limit,
            None => {
                self.records.insert(
                    identity.to_string(),
                    QuotaRecord {
                        identity: identity.to_string(),
                        window_start: now,
                        count_in_window: 0,
                        hourly_limit: limit,
                    },
                );
            }
        }
    }

    fn purge_attempts_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.attempts.len();
        self.attempts.retain(|a| a.sent_at >= cutoff);
        before - self.attempts.len()
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryQuotaStore {
    state: Mutex<StoreState>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn load(&self, identity: &str) -> Result<Option<QuotaRecord>> {
        Ok(self.state.lock().await.records.get(identity).cloned())
    }

    async fn save(&self, record: &QuotaRecord) -> Result<()> {
        self.state
            .lock()
            .await
            .records
            .insert(record.identity.clone(), record.clone());
        Ok(())
    }

    async fn set_limit(&self, identity: &str, limit: u32, now: DateTime<Utc>) -> Result<()> {
        self.state.lock().await.set_limit(identity, limit, now);
        Ok(())
    }

    async fn record_attempt(&self, identity: &str, at: DateTime<Utc>) -> Result<()> {
        self.state.lock().await.attempts.push(AttemptEntry {
            identity: identity.to_string(),
            sent_at: at,
        });
        Ok(())
    }

    async fn purge_attempts_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(self.state.lock().await.purge_attempts_before(cutoff))
    }
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::QuotaStoreUnavailable(e.to_string())
}

/// Single-file JSON store. The whole document is read and rewritten per
/// operation under a mutex, which is plenty for the traffic this gateway
/// sees and keeps the on-disk format trivially inspectable.
pub struct FileQuotaStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileQuotaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    fn read_state(&self) -> Result<StoreState> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(StoreState::default()),
            Ok(raw) => serde_json::from_str(&raw).map_err(store_err),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(store_err(e)),
        }
    }

    fn write_state(&self, state: &StoreState) -> Result<()> {
        let raw = serde_json::to_string_pretty(state).map_err(store_err)?;
        std::fs::write(&self.path, raw).map_err(store_err)
    }
}

#[async_trait]
impl QuotaStore for FileQuotaStore {
    async fn load(&self, identity: &str) -> Result<Option<QuotaRecord>> {
        let _guard = self.guard.lock().await;
        Ok(self.read_state()?.records.get(identity).cloned())
    }

    async fn save(&self, record: &QuotaRecord) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut state = self.read_state()?;
        state
            .records
            .insert(record.identity.clone(), record.clone());
        self.write_state(&state)
    }

    async fn set_limit(&self, identity: &str, limit: u32, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut state = self.read_state()?;
        state.set_limit(identity, limit, now);
        self.write_state(&state)
    }

    async fn record_attempt(&self, identity: &str, at: DateTime<Utc>) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut state = self.read_state()?;
        state.attempts.push(AttemptEntry {
            identity: identity.to_string(),
            sent_at: at,
        });
        self.write_state(&state)
    }

    async fn purge_attempts_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.guard.lock().await;
        let mut state = self.read_state()?;
        let removed = state.purge_attempts_before(cutoff);
        if removed > 0 {
            self.write_state(&state)?;
        }
        Ok(removed)
    }
}
