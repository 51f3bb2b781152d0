//! Twilio webhook signature verification.
//!
//! Twilio signs the full webhook URL concatenated with the form parameters
//! in sorted key order, HMAC-SHA1 over the auth token, base64-encoded, in
//! the `X-Twilio-Signature` header.

use std::collections::BTreeMap;

use base64::Engine;
use ring::hmac;

fn signing_payload(url: &str, params: &BTreeMap<String, String>) -> String {
    let mut data = url.to_string();
    for (key, value) in params {
        data.push_str(key);
        data.push_str(value);
    }
    data
}

/// Compute the signature Twilio would attach to this request.
pub fn compute_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, auth_token.as_bytes());
    let tag = hmac::sign(&key, signing_payload(url, params).as_bytes());
    base64::engine::general_purpose::STANDARD.encode(tag.as_ref())
}

/// Check a provided header value against the expected signature in
/// constant time.
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    provided: &str,
) -> bool {
    let Ok(provided_raw) = base64::engine::general_purpose::STANDARD.decode(provided) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, auth_token.as_bytes());
    hmac::verify(&key, signing_payload(url, params).as_bytes(), &provided_raw).is_ok()
}
