//! Background processing for inbound attachments.
//!
//! The webhook path only acknowledges receipt; everything here runs on a
//! spawned task after the HTTP response has gone out. Jobs are not
//! serialized per user and are never cancelled, so two uploads in quick
//! succession may finish in either order.

use std::sync::Arc;

use ammi_channels::{classify_media, MediaFetcher, MediaKind, MessageSender};
use ammi_common::{Error, Result};
use ammi_db::{NewHealthRecord, RecordStore, RecordType, SourceType};
use ammi_oracle::{prompts, Oracle};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::format;

pub(crate) struct MediaJob {
    pub records: Arc<Mutex<RecordStore>>,
    pub oracle: Arc<Oracle>,
    pub sender: Arc<dyn MessageSender>,
    pub fetcher: Arc<MediaFetcher>,
    pub user_id: String,
    pub from_number: String,
    pub media_url: String,
    pub content_type: String,
}

pub(crate) fn spawn(job: MediaJob) {
    tokio::spawn(async move {
        job.run().await;
    });
}

impl MediaJob {
    async fn run(self) {
        // Follow-ups go straight out through the sender. They are not
        // appended to the conversation log; only synchronous reply paths
        // write there.
        if let Err(e) = self.process().await {
            error!(user_id = %self.user_id, error = %e, "media processing failed");
            let _ = self
                .sender
                .send_message(&self.from_number, format::MEDIA_APOLOGY, None)
                .await;
        }
    }

    async fn process(&self) -> Result<()> {
        let bytes = match self.fetcher.fetch(&self.media_url).await {
            Ok((bytes, _)) => bytes,
            Err(e) => {
                warn!(url = %self.media_url, error = %e, "media download failed");
                self.send(format::DOWNLOAD_FAILED).await?;
                return Ok(());
            }
        };

        let reply = match classify_media(&self.content_type) {
            MediaKind::Image => self.process_image(&bytes).await?,
            MediaKind::Pdf => self.process_pdf(&bytes).await?,
            MediaKind::Unsupported => {
                self.send(format::UNSUPPORTED_MEDIA).await?;
                return Ok(());
            }
        };

        self.send(&reply).await?;
        Ok(())
    }

    async fn process_image(&self, bytes: &[u8]) -> Result<String> {
        let analysis = self
            .oracle
            .analyze_image(bytes, &self.content_type, prompts::IMAGE_EXTRACTION_PROMPT)
            .await;

        self.save_record(SourceType::Image, analysis.clone(), &analysis)
            .await?;
        Ok(format::report_saved(&analysis))
    }

    async fn process_pdf(&self, bytes: &[u8]) -> Result<String> {
        let data = bytes.to_vec();
        let extracted =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                .await
                .map_err(|e| Error::Media(format!("pdf extraction task failed: {e}")))?;

        // Extraction failure usually means a scanned, image-only PDF.
        let text = match extracted {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return Ok(format::PDF_NO_TEXT.to_string()),
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "pdf text extraction failed");
                return Ok(format::PDF_NO_TEXT.to_string());
            }
        };

        let prompt = format!("Analyze this health report and provide a summary:\n\n{text}");
        let analysis = self
            .oracle
            .analyze_text(&prompt, None, prompts::REPORT_ANALYSIS_SYSTEM_PROMPT)
            .await;

        self.save_record(SourceType::Pdf, text, &analysis).await?;
        Ok(format::pdf_report_saved(&analysis))
    }

    async fn save_record(
        &self,
        source_type: SourceType,
        raw_data: String,
        analysis: &str,
    ) -> Result<()> {
        let id = self.records.lock().await.insert_record(NewHealthRecord {
            user_id: self.user_id.clone(),
            // Content-derived classification is a known gap; everything
            // ingested through media lands as blood work for now.
            record_type: RecordType::BloodWork,
            date: Utc::now(),
            source_type,
            raw_data,
            structured_data: None,
            analysis: Some(analysis.to_string()),
        })?;
        info!(user_id = %self.user_id, record_id = %id, "media record saved");
        Ok(())
    }

    async fn send(&self, body: &str) -> Result<()> {
        let delivered = self.sender.send_message(&self.from_number, body, None).await?;
        if !delivered {
            warn!(to = %self.from_number, "media follow-up was not accepted");
        }
        Ok(())
    }
}
