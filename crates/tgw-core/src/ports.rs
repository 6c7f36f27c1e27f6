use async_trait::async_trait;

use crate::Result;

/// Content source the gateway resolves a query against before delivery.
/// Implementations live in adapter crates (HTTP fetchers) or in tests
/// (canned fakes).
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Short name used in operational logs.
    fn name(&self) -> &str;

    async fn fetch(&self, query: &str) -> Result<String>;
}
