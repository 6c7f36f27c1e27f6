use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::domain::Identity;
use crate::transport::port::{TransportCapabilities, TransportSender};
use crate::Result;

#[derive(Clone, Copy, Debug)]
pub struct PacingConfig {
    /// Minimum spacing between *any* outbound deliveries (provider flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between deliveries to the same identity.
    pub per_identity_min_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),
            per_identity_min_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// TransportSender decorator that spaces out consecutive deliveries.
///
/// Multi-segment payloads are delivered one message at a time with the
/// configured gap in between, so a burst of segments to one sender does not
/// trip provider-side flood limits.
pub struct PacedSender {
    inner: Arc<dyn TransportSender>,
    cfg: PacingConfig,
    global: Mutex<IntervalLimiter>,
    per_identity: Mutex<HashMap<String, Arc<Mutex<IntervalLimiter>>>>,
}

impl PacedSender {
    pub fn new(inner: Arc<dyn TransportSender>, cfg: PacingConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_identity: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for(&self, identity: &Identity) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_identity.lock().await;
        map.entry(identity.0.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_identity_min_interval,
                )))
            })
            .clone()
    }

    async fn pace(&self, identity: &Identity) {
        let global_wait = { self.global.lock().await.reserve() };
        let identity_wait = {
            let lim = self.limiter_for(identity).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = if global_wait > identity_wait {
            global_wait
        } else {
            identity_wait
        };
        if wait > Duration::from_millis(0) {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl TransportSender for PacedSender {
    fn capabilities(&self) -> TransportCapabilities {
        self.inner.capabilities()
    }

    async fn send(&self, identity: &Identity, messages: &[String]) -> Result<()> {
        for msg in messages {
            self.pace(identity).await;
            self.inner.send(identity, std::slice::from_ref(msg)).await?;
        }
        Ok(())
    }
}
