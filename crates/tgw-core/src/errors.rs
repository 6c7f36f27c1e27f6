/// Core error type for the gateway.
///
/// Adapter crates map their specific errors into this type so transport
/// handlers can apply a single policy (skip the item, fail closed, notify
/// the sender).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// A raw transport segment that does not carry the `GW<n>|` framing or
    /// whose payload is not decodable.
    #[error("malformed segment: {0}")]
    MalformedSegment(String),

    /// The quota store could not be reached or the check-and-increment could
    /// not be completed. Callers must treat this as "deny" (fail closed).
    #[error("quota store unavailable: {0}")]
    QuotaStoreUnavailable(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
