use ammi_common::{Error, Result};
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// What an incoming attachment is, judged by its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    Unsupported,
}

/// Classify an attachment MIME type for the media pipeline.
pub fn classify_media(content_type: &str) -> MediaKind {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    if mime.starts_with("image/") {
        MediaKind::Image
    } else if mime == "application/pdf" {
        MediaKind::Pdf
    } else {
        MediaKind::Unsupported
    }
}

/// Downloads attachments from Twilio media URLs. Twilio serves media behind
/// basic auth using the account credentials.
pub struct MediaFetcher {
    client: Client,
    account_sid: String,
    auth_token: String,
}

impl MediaFetcher {
    pub fn new(account_sid: String, auth_token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| Error::Media(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            account_sid,
            auth_token,
        })
    }

    /// Fetch the attachment bytes. Returns the body and the Content-Type the
    /// server reported, which may be more precise than the webhook hint.
    pub async fn fetch(&self, url: &str) -> Result<(Bytes, String)> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| Error::Media(format!("media download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Media(format!(
                "media download returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Media(format!("media body read failed: {e}")))?;

        debug!(url, size = bytes.len(), %content_type, "media downloaded");
        Ok((bytes, content_type))
    }
}
