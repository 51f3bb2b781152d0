use ammi_common::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::split::split_message;
use crate::traits::MessageSender;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Pause between chunks so WhatsApp delivers them in order.
const CHUNK_DELAY: Duration = Duration::from_millis(500);

/// Sends WhatsApp messages through the Twilio Messages API. Long bodies are
/// split into chunks; every chunk after the first carries a `(i/N)` prefix.
pub struct TwilioSender {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: Client,
    base_url: String,
}

impl TwilioSender {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: Client::new(),
            base_url: TWILIO_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }

    async fn send_one(&self, to: &str, body: &str, media_url: Option<&str>) -> Result<bool> {
        let mut form = vec![
            ("From", self.from_number.clone()),
            ("To", to.to_string()),
            ("Body", body.to_string()),
        ];
        if let Some(url) = media_url {
            form.push(("MediaUrl", url.to_string()));
        }

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("twilio request failed: {e}")))?;

        if response.status().is_success() {
            debug!(to, "message chunk sent");
            Ok(true)
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(to, %status, body = %text, "twilio rejected message");
            Ok(false)
        }
    }
}

/// Prefix all chunks after the first with their position, e.g. `(2/3) `.
fn number_chunks(chunks: Vec<String>) -> Vec<String> {
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            if i == 0 {
                chunk
            } else {
                format!("({}/{total}) {chunk}", i + 1)
            }
        })
        .collect()
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn send_message(&self, to: &str, body: &str, media_url: Option<&str>) -> Result<bool> {
        let to = if to.starts_with("whatsapp:") {
            to.to_string()
        } else {
            format!("whatsapp:{to}")
        };

        let chunks = number_chunks(split_message(body));
        let total = chunks.len();
        let mut all_ok = true;

        for (i, chunk) in chunks.iter().enumerate() {
            // Media rides on the first chunk only.
            let media = if i == 0 { media_url } else { None };
            if !self.send_one(&to, chunk, media).await? {
                all_ok = false;
            }
            if i + 1 < total {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
        }

        Ok(all_ok)
    }
}
