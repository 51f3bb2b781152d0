//! The Twilio WhatsApp webhook: signature check, payload validation,
//! per-sender rate limiting, then dispatch into the intent router and a
//! TwiML reply envelope.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use ammi_assistant::{MediaItem, ReplyOutcome};
use ammi_common::is_valid_phone;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

use crate::signature::verify_signature;
use crate::state::AppState;

const WEBHOOK_PATH: &str = "/webhook/whatsapp";
const MAX_BODY_CHARS: usize = 5000;
const MAX_NUM_MEDIA: u32 = 10;

/// POST /webhook/whatsapp
pub async fn receive_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let params = parse_form(&body);

    if !state.skip_signature_check && !signature_ok(&state, &headers, &params) {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let Some(from) = params.get("From") else {
        warn!("webhook missing From field");
        return (StatusCode::BAD_REQUEST, "Invalid request: Missing From field").into_response();
    };
    if !is_valid_phone(from) {
        warn!(from = %from, "webhook with invalid phone number");
        return (StatusCode::BAD_REQUEST, "Invalid request: Invalid phone number").into_response();
    }

    let num_media = params
        .get("NumMedia")
        .map(|v| v.parse::<u32>())
        .unwrap_or(Ok(0));
    let num_media = match num_media {
        Ok(n) if n <= MAX_NUM_MEDIA => n,
        _ => {
            warn!("webhook with invalid NumMedia");
            return (StatusCode::BAD_REQUEST, "Invalid request: Invalid NumMedia").into_response();
        }
    };

    if !state.limiter.check(from) {
        warn!(from = %from, "rate limit exceeded");
        return (StatusCode::TOO_MANY_REQUESTS, "Too many requests. Please slow down.")
            .into_response();
    }

    let message_body = params
        .get("Body")
        .map(|b| sanitize_input(b))
        .unwrap_or_default();

    let media = (num_media > 0)
        .then(|| params.get("MediaUrl0"))
        .flatten()
        .map(|url| MediaItem {
            url: url.clone(),
            content_type: params
                .get("MediaContentType0")
                .cloned()
                .unwrap_or_default(),
        });

    info!(from = %from, num_media, "webhook accepted");
    let outcome = state.handler.handle_incoming(from, &message_body, media).await;

    let twiml = match outcome {
        ReplyOutcome::Send(text) => reply_envelope(&text),
        // A reply already went out through the sender; return an empty
        // envelope so Twilio does not send anything on top.
        ReplyOutcome::AlreadyDelivered => empty_envelope(),
    };

    ([(header::CONTENT_TYPE, "text/xml")], twiml).into_response()
}

/// GET /webhook/whatsapp, used by provider-side endpoint checks.
pub async fn verify_endpoint() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Webhook endpoint is active",
    }))
}

fn signature_ok(state: &AppState, headers: &HeaderMap, params: &BTreeMap<String, String>) -> bool {
    let Some(provided) = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
    else {
        warn!("webhook missing Twilio signature header");
        return false;
    };

    let Some(url) = webhook_url(state, headers) else {
        warn!("cannot determine webhook URL for signature check");
        return false;
    };

    let valid = verify_signature(&state.auth_token, &url, params, provided);
    if !valid {
        warn!("invalid Twilio signature");
    }
    valid
}

/// The full URL Twilio signed: the configured public base if present,
/// otherwise reconstructed from the Host header.
fn webhook_url(state: &AppState, headers: &HeaderMap) -> Option<String> {
    if let Some(base) = &state.public_url {
        return Some(format!("{}{WEBHOOK_PATH}", base.trim_end_matches('/')));
    }
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|host| format!("https://{host}{WEBHOOK_PATH}"))
}

/// Decode an application/x-www-form-urlencoded body. BTreeMap keeps keys
/// sorted, which is exactly the order signature verification needs.
pub fn parse_form(body: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Strip script tags and cap length before the message reaches the router.
pub fn sanitize_input(input: &str) -> String {
    static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
    let re = SCRIPT_RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script>").unwrap_or_else(|_| unreachable!())
    });

    let without_scripts = re.replace_all(input, "");
    let capped: String = without_scripts.chars().take(MAX_BODY_CHARS).collect();
    capped.trim().to_string()
}

pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn reply_envelope(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Message>{}</Message>\n</Response>",
        escape_xml(message)
    )
}

fn empty_envelope() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response></Response>".to_string()
}
