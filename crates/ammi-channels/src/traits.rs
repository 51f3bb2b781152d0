use ammi_common::Result;
use async_trait::async_trait;

/// Outbound message channel. Implementations handle chunking and any
/// transport-specific addressing; callers pass a bare E.164 number.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a message, splitting it into chunks if the transport requires.
    /// Returns true if every chunk was accepted.
    async fn send_message(&self, to: &str, body: &str, media_url: Option<&str>) -> Result<bool>;
}
