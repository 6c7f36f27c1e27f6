use async_trait::async_trait;

use crate::domain::Identity;
use crate::Result;

/// What the gateway needs to know about a transport to segment for it.
#[derive(Debug, Clone, Copy)]
pub struct TransportCapabilities {
    /// Maximum characters per outbound message.
    pub max_message_len: usize,
    /// Whether segments must carry the `GW<i>|` base64 framing. SMS-style
    /// transports set this; long-message transports deliver plain text.
    pub encode: bool,
}

/// Outbound delivery port. Implementations deliver `messages` to the given
/// identity strictly in order.
#[async_trait]
pub trait TransportSender: Send + Sync {
    fn capabilities(&self) -> TransportCapabilities;

    async fn send(&self, identity: &Identity, messages: &[String]) -> Result<()>;
}
