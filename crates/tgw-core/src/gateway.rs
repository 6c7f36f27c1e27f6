//! Request orchestration: quota admission, content fetch, segmentation,
//! delivery.

use std::sync::Arc;

use crate::config::Config;
use crate::domain::{Identity, QuotaDecision, SubscriptionStatus};
use crate::ports::ContentFetcher;
use crate::quota::QuotaTracker;
use crate::segment;
use crate::transport::TransportSender;
use crate::Result;

/// What happened to one inbound request. Callers branch on this instead of
/// parsing logs; errors that must fail closed (quota store loss) propagate
/// as `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered { segments: usize },
    RateLimited,
    FetchFailed { reason: String },
    SendFailed { reason: String },
}

/// One inbound request waiting to be processed.
pub struct InboundItem<'a> {
    pub identity: Identity,
    pub fetcher: &'a dyn ContentFetcher,
    pub query: String,
}

pub struct Gateway {
    cfg: Arc<Config>,
    quota: Arc<QuotaTracker>,
    sender: Arc<dyn TransportSender>,
}

impl Gateway {
    pub fn new(cfg: Arc<Config>, quota: Arc<QuotaTracker>, sender: Arc<dyn TransportSender>) -> Self {
        Self { cfg, quota, sender }
    }

    /// Process one request end to end.
    ///
    /// Quota is consumed at admission, before the fetch; a failed fetch does
    /// not refund it. A quota store failure propagates (the caller must not
    /// deliver anything in that case).
    pub async fn handle_request(
        &self,
        identity: &Identity,
        fetcher: &dyn ContentFetcher,
        query: &str,
    ) -> Result<Outcome> {
        match self.quota.check_and_record(identity).await? {
            QuotaDecision::Allowed => {}
            QuotaDecision::Denied => {
                // Best effort: a failed notice must not mask the denial.
                if let Err(e) = self.send_text(identity, &self.cfg.rate_limit_notice).await {
                    eprintln!("[gateway] rate-limit notice to {identity} failed: {e}");
                }
                return Ok(Outcome::RateLimited);
            }
        }

        let text = match fetcher.fetch(query).await {
            Ok(text) => text,
            Err(e) => {
                eprintln!(
                    "[gateway] {} fetch for {identity} failed: {e}",
                    fetcher.name()
                );
                return Ok(Outcome::FetchFailed {
                    reason: e.to_string(),
                });
            }
        };

        match self.send_text(identity, &text).await {
            Ok(segments) => Ok(Outcome::Delivered { segments }),
            Err(e) => {
                eprintln!("[gateway] delivery to {identity} failed: {e}");
                Ok(Outcome::SendFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Process a batch, one outcome per item. A failed item never aborts
    /// the rest of the batch.
    pub async fn handle_batch(&self, items: &[InboundItem<'_>]) -> Vec<Result<Outcome>> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(
                self.handle_request(&item.identity, item.fetcher, &item.query)
                    .await,
            );
        }
        outcomes
    }

    /// Apply a subscription lifecycle event to the sender's tier. Returns
    /// the hourly limit now in effect.
    pub async fn apply_subscription(
        &self,
        identity: &Identity,
        status: SubscriptionStatus,
    ) -> Result<u32> {
        let limit = match status {
            SubscriptionStatus::Active => self.cfg.subscriber_hourly_limit,
            _ => self.cfg.default_hourly_limit,
        };
        self.quota.set_tier(identity, limit).await?;
        println!("[gateway] {identity} tier set to {limit}/hour ({status:?})");
        Ok(limit)
    }

    /// Segment `text` for the transport and deliver the ordered list.
    /// Empty text sends nothing and reports zero segments.
    async fn send_text(&self, identity: &Identity, text: &str) -> Result<usize> {
        let caps = self.sender.capabilities();
        let messages = if caps.encode {
            segment::split_and_encode(text, caps.max_message_len)
        } else {
            segment::split(text, caps.max_message_len)
        };
        if messages.is_empty() {
            return Ok(0);
        }
        self.sender.send(identity, &messages).await?;
        Ok(messages.len())
    }
}
