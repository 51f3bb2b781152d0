use std::sync::Arc;

use ammi_assistant::MessageHandler;

use crate::rate_limit::RateLimiter;

/// Shared state for the axum router.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<MessageHandler>,
    pub limiter: Arc<RateLimiter>,
    /// Twilio auth token, used to verify webhook signatures.
    pub auth_token: String,
    /// Externally visible base URL. When set, signature verification uses
    /// it instead of the Host header.
    pub public_url: Option<String>,
    /// Development mode skips signature verification so local testing
    /// works without a Twilio-signed request.
    pub skip_signature_check: bool,
}
