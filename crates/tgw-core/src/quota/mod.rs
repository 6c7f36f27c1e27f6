//! Per-sender hourly quota with discrete window reset.
//!
//! Each identity owns one window. A window opens on the first admitted
//! request and lasts a full hour; requests inside it are counted against
//! the identity's tier limit, and the first request after the hour has
//! elapsed resets the window. There is no sliding decay, which makes the
//! state a single small record that survives restarts via [`QuotaStore`].

pub mod store;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::{Identity, QuotaDecision};
use crate::errors::{Error, Result};
use store::QuotaStore;

/// Hourly limit for senders on the free tier.
pub const DEFAULT_HOURLY_LIMIT: u32 = 5;
/// Hourly limit for senders with an active subscription.
pub const SUBSCRIBER_HOURLY_LIMIT: u32 = 20;

/// Persistent quota state for one identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaRecord {
    pub identity: String,
    pub window_start: DateTime<Utc>,
    pub count_in_window: u32,
    pub hourly_limit: u32,
}

/// One async mutex per identity so check-and-increment is atomic for a
/// sender while unrelated senders proceed in parallel.
#[derive(Default)]
struct IdentityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    async fn acquire(&self, identity: &Identity) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(identity.0.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct QuotaTracker {
    store: Arc<dyn QuotaStore>,
    locks: IdentityLocks,
    default_limit: u32,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self::with_default_limit(store, DEFAULT_HOURLY_LIMIT)
    }

    pub fn with_default_limit(store: Arc<dyn QuotaStore>, default_limit: u32) -> Self {
        Self {
            store,
            locks: IdentityLocks::default(),
            default_limit,
        }
    }

    /// Admission check against the current wall clock.
    pub async fn check_and_record(&self, identity: &Identity) -> Result<QuotaDecision> {
        self.check_and_record_at(identity, Utc::now()).await
    }

    /// Admission check at an explicit instant. Admitting increments the
    /// window counter, persists the record and appends an attempt entry;
    /// a denial leaves the stored state untouched.
    pub async fn check_and_record_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision> {
        let _guard = self.locks.acquire(identity).await;

        let mut record = match self.store.load(&identity.0).await? {
            Some(record) => record,
            None => QuotaRecord {
                identity: identity.0.clone(),
                window_start: now,
                count_in_window: 0,
                hourly_limit: self.default_limit,
            },
        };

        if now - record.window_start >= Duration::hours(1) {
            record.window_start = now;
            record.count_in_window = 0;
        }

        if record.count_in_window >= record.hourly_limit {
            return Ok(QuotaDecision::Denied);
        }

        record.count_in_window += 1;
        self.store.save(&record).await?;
        self.store.record_attempt(&identity.0, now).await?;
        Ok(QuotaDecision::Allowed)
    }

    /// Move an identity to a different tier. The current window and count
    /// carry over, so a mid-window upgrade takes effect immediately.
    pub async fn set_tier(&self, identity: &Identity, limit: u32) -> Result<()> {
        let _guard = self.locks.acquire(identity).await;
        self.store.set_limit(&identity.0, limit, Utc::now()).await
    }

    /// Drop attempt-log entries older than `retention`.
    pub async fn purge_attempts(&self, retention: StdDuration) -> Result<usize> {
        let retention = Duration::from_std(retention)
            .map_err(|e| Error::Config(format!("retention out of range: {e}")))?;
        self.store.purge_attempts_before(Utc::now() - retention).await
    }
}

/// Background purge of the attempt log. Runs until `cancel` fires; a
/// failing purge is logged and retried on the next tick.
pub async fn retention_loop(
    tracker: Arc<QuotaTracker>,
    interval: StdDuration,
    retention: StdDuration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                println!("[quota] retention loop stopped");
                return;
            }
            _ = ticker.tick() => match tracker.purge_attempts(retention).await {
                Ok(0) => {}
                Ok(n) => println!("[quota] purged {n} expired attempt entries"),
                Err(e) => eprintln!("[quota] attempt purge failed: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::store::MemoryQuotaStore;
    use super::*;
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl QuotaStore for FailingStore {
        async fn load(&self, _identity: &str) -> Result<Option<QuotaRecord>> {
            Err(Error::QuotaStoreUnavailable("store offline".into()))
        }
        async fn save(&self, _record: &QuotaRecord) -> Result<()> {
            Err(Error::QuotaStoreUnavailable("store offline".into()))
        }
        async fn set_limit(&self, _identity: &str, _limit: u32, _now: DateTime<Utc>) -> Result<()> {
            Err(Error::QuotaStoreUnavailable("store offline".into()))
        }
        async fn record_attempt(&self, _identity: &str, _at: DateTime<Utc>) -> Result<()> {
            Err(Error::QuotaStoreUnavailable("store offline".into()))
        }
        async fn purge_attempts_before(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
            Err(Error::QuotaStoreUnavailable("store offline".into()))
        }
    }

    fn tracker() -> QuotaTracker {
        QuotaTracker::new(Arc::new(MemoryQuotaStore::new()))
    }

    #[tokio::test]
    async fn default_tier_allows_five_then_denies() {
        let tracker = tracker();
        let id = Identity::new("905551112233");
        let now = Utc::now();

        for _ in 0..DEFAULT_HOURLY_LIMIT {
            assert_eq!(
                tracker.check_and_record_at(&id, now).await.unwrap(),
                QuotaDecision::Allowed
            );
        }
        assert_eq!(
            tracker.check_and_record_at(&id, now).await.unwrap(),
            QuotaDecision::Denied
        );
    }

    #[tokio::test]
    async fn window_resets_after_an_hour() {
        let store = Arc::new(MemoryQuotaStore::new());
        let tracker = QuotaTracker::new(store.clone());
        let id = Identity::new("905551112233");
        let start = Utc::now();

        for _ in 0..=DEFAULT_HOURLY_LIMIT {
            let _ = tracker.check_and_record_at(&id, start).await.unwrap();
        }

        let later = start + Duration::hours(1);
        assert_eq!(
            tracker.check_and_record_at(&id, later).await.unwrap(),
            QuotaDecision::Allowed
        );

        // Fresh window: the reset call itself is the first count.
        let record = store.load(&id.0).await.unwrap().unwrap();
        assert_eq!(record.window_start, later);
        assert_eq!(record.count_in_window, 1);
    }

    #[tokio::test]
    async fn fifty_nine_minutes_is_still_the_same_window() {
        let tracker = tracker();
        let id = Identity::new("id");
        let start = Utc::now();

        for _ in 0..DEFAULT_HOURLY_LIMIT {
            let _ = tracker.check_and_record_at(&id, start).await.unwrap();
        }
        assert_eq!(
            tracker
                .check_and_record_at(&id, start + Duration::minutes(59))
                .await
                .unwrap(),
            QuotaDecision::Denied
        );
    }

    #[tokio::test]
    async fn subscriber_tier_raises_the_limit() {
        let tracker = tracker();
        let id = Identity::new("subscriber");
        let now = Utc::now();

        tracker.set_tier(&id, SUBSCRIBER_HOURLY_LIMIT).await.unwrap();
        for _ in 0..SUBSCRIBER_HOURLY_LIMIT {
            assert_eq!(
                tracker.check_and_record_at(&id, now).await.unwrap(),
                QuotaDecision::Allowed
            );
        }
        assert_eq!(
            tracker.check_and_record_at(&id, now).await.unwrap(),
            QuotaDecision::Denied
        );
    }

    #[tokio::test]
    async fn identities_are_independent() {
        let tracker = tracker();
        let now = Utc::now();
        let a = Identity::new("a");
        let b = Identity::new("b");

        for _ in 0..DEFAULT_HOURLY_LIMIT {
            let _ = tracker.check_and_record_at(&a, now).await.unwrap();
        }
        assert_eq!(
            tracker.check_and_record_at(&a, now).await.unwrap(),
            QuotaDecision::Denied
        );
        assert_eq!(
            tracker.check_and_record_at(&b, now).await.unwrap(),
            QuotaDecision::Allowed
        );
    }

    #[tokio::test]
    async fn concurrent_checks_admit_exactly_the_limit() {
        let tracker = Arc::new(tracker());
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker
                    .check_and_record_at(&Identity::new("contended"), now)
                    .await
                    .unwrap()
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() == QuotaDecision::Allowed {
                allowed += 1;
            }
        }
        assert_eq!(allowed, DEFAULT_HOURLY_LIMIT);
    }

    #[tokio::test]
    async fn store_failure_is_an_error_not_a_decision() {
        let tracker = QuotaTracker::new(Arc::new(FailingStore));
        let result = tracker.check_and_record(&Identity::new("anyone")).await;
        assert!(matches!(result, Err(Error::QuotaStoreUnavailable(_))));
    }

    #[tokio::test]
    async fn admissions_feed_the_attempt_log() {
        let store = Arc::new(MemoryQuotaStore::new());
        let tracker = QuotaTracker::new(store.clone());
        let id = Identity::new("logged");

        for _ in 0..3 {
            let _ = tracker.check_and_record(&id).await.unwrap();
        }
        // Nothing is old enough to purge yet.
        assert_eq!(
            tracker
                .purge_attempts(StdDuration::from_secs(24 * 3600))
                .await
                .unwrap(),
            0
        );
        let removed = store
            .purge_attempts_before(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 3);
    }
}
