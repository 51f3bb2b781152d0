//! The intent router. Given raw text, an optional media descriptor, and
//! recent history, picks exactly one handling path. The decision order is
//! load-bearing: new-user gate, media, command, numeric selector, explain
//! pattern, health-data entry, free-text question.

use std::sync::Arc;

use ammi_channels::{classify_media, MediaFetcher, MessageSender};
use ammi_common::{ConversationRole, Result};
use ammi_db::{HealthRecord, NewHealthRecord, RecordStore, RecordType, SourceType, UserStore};
use ammi_oracle::{prompts, ExtractionKind, Oracle};
use chrono::{Months, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::commands::Command;
use crate::context::{build_health_context, CONTEXT_RECORD_LIMIT};
use crate::format;
use crate::intent;
use crate::media::{self, MediaJob};

/// Limits mirrored in the reply text: /records shows up to 10, /status
/// shows the last 5.
const RECORD_LIST_LIMIT: usize = 10;
const STATUS_RECORD_LIMIT: usize = 5;
const QUESTION_HISTORY_LIMIT: usize = 10;
const TRENDS_WINDOW_MONTHS: u32 = 6;

/// An inbound attachment descriptor from the webhook.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub url: String,
    pub content_type: String,
}

/// What the router hands back to the ingress layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Reply with this text in the webhook response.
    Send(String),
    /// A reply was already pushed through the sender; respond with an
    /// empty envelope and do not send anything else.
    AlreadyDelivered,
}

pub struct MessageHandler {
    users: Arc<Mutex<UserStore>>,
    records: Arc<Mutex<RecordStore>>,
    oracle: Arc<Oracle>,
    sender: Arc<dyn MessageSender>,
    fetcher: Arc<MediaFetcher>,
    default_timezone: String,
}

impl MessageHandler {
    pub fn new(
        users: Arc<Mutex<UserStore>>,
        records: Arc<Mutex<RecordStore>>,
        oracle: Arc<Oracle>,
        sender: Arc<dyn MessageSender>,
        fetcher: Arc<MediaFetcher>,
        default_timezone: String,
    ) -> Self {
        Self {
            users,
            records,
            oracle,
            sender,
            fetcher,
            default_timezone,
        }
    }

    /// Route one inbound message. Never fails: any error inside a handling
    /// path is logged and turned into a generic apology.
    pub async fn handle_incoming(
        &self,
        from_number: &str,
        body: &str,
        media: Option<MediaItem>,
    ) -> ReplyOutcome {
        match self.handle_inner(from_number, body, media).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(from = %from_number, error = %e, "message handling failed");
                ReplyOutcome::Send(format::GENERIC_APOLOGY.to_string())
            }
        }
    }

    async fn handle_inner(
        &self,
        from_number: &str,
        body: &str,
        media: Option<MediaItem>,
    ) -> Result<ReplyOutcome> {
        info!(from = %from_number, "received message: {}", ammi_common::truncate_text(body, 100));

        let user = self
            .users
            .lock()
            .await
            .get_or_create_user(from_number, &self.default_timezone)?;

        // New-user gate: until a name is stored, everything is onboarding
        // and nothing is written to the conversation log.
        if user.name.is_empty() {
            return Ok(ReplyOutcome::Send(self.handle_onboarding(&user.id, body).await?));
        }

        self.users
            .lock()
            .await
            .append_message(&user.id, ConversationRole::User, body)?;

        if let Some(media) = media {
            let ack = self.handle_media(&user.id, from_number, media).await;
            self.users
                .lock()
                .await
                .append_message(&user.id, ConversationRole::Assistant, &ack)?;
            return Ok(ReplyOutcome::Send(ack));
        }

        let outcome = self.handle_text(&user.id, from_number, body).await?;

        if let ReplyOutcome::Send(reply) = &outcome {
            self.users
                .lock()
                .await
                .append_message(&user.id, ConversationRole::Assistant, reply)?;
        }
        Ok(outcome)
    }

    async fn handle_onboarding(&self, user_id: &str, body: &str) -> Result<String> {
        if intent::looks_like_name(body)
            && let Some(name) = intent::extract_name(body)
        {
            self.users.lock().await.set_user_name(user_id, &name)?;
            info!(user_id = %user_id, "onboarded user as {name}");
            return Ok(format::name_confirmation(&name));
        }
        Ok(format::welcome())
    }

    /// Acknowledge the upload and kick off background processing. The
    /// eventual analysis is delivered by the spawned job, not here.
    async fn handle_media(&self, user_id: &str, from_number: &str, media: MediaItem) -> String {
        let kind = classify_media(&media.content_type);
        media::spawn(MediaJob {
            records: self.records.clone(),
            oracle: self.oracle.clone(),
            sender: self.sender.clone(),
            fetcher: self.fetcher.clone(),
            user_id: user_id.to_string(),
            from_number: from_number.to_string(),
            media_url: media.url,
            content_type: media.content_type,
        });
        format::media_ack(kind)
    }

    async fn handle_text(
        &self,
        user_id: &str,
        from_number: &str,
        body: &str,
    ) -> Result<ReplyOutcome> {
        let trimmed = body.trim();

        if trimmed.starts_with('/') {
            let reply = match Command::parse(trimmed) {
                Some(command) => self.run_command(user_id, command).await?,
                None => format::UNKNOWN_COMMAND.to_string(),
            };
            return Ok(ReplyOutcome::Send(reply));
        }

        if let Some(n) = intent::parse_numeric_selector(trimmed) {
            let history = self
                .users
                .lock()
                .await
                .recent_messages(user_id, intent::LOOKBACK_WINDOW)?;

            if intent::recently_viewed_records(&history) {
                self.send_direct(from_number, &format::fetching_record(n)).await;
                let detail = self.record_detail(user_id, n).await?;
                self.send_direct(from_number, &detail).await;
                return Ok(ReplyOutcome::AlreadyDelivered);
            }

            if let Some(command) = Command::from_menu_digit(n) {
                return Ok(ReplyOutcome::Send(self.run_command(user_id, command).await?));
            }
        }

        if let Some(n) = intent::parse_explain_record(trimmed) {
            self.send_direct(from_number, &format::explaining_record(n)).await;
            let explanation = self.explain_record(user_id, n).await?;
            self.send_direct(from_number, &explanation).await;
            return Ok(ReplyOutcome::AlreadyDelivered);
        }

        if intent::is_health_data_entry(body) {
            return Ok(ReplyOutcome::Send(self.save_health_entry(user_id, body).await));
        }

        Ok(ReplyOutcome::Send(self.answer_question(user_id, body).await?))
    }

    async fn run_command(&self, user_id: &str, command: Command) -> Result<String> {
        match command {
            Command::Help => Ok(format::help_menu()),
            Command::Status => {
                let store = self.records.lock().await;
                let total = store.count_records(user_id)?;
                let recent = store.recent_records(user_id, STATUS_RECORD_LIMIT)?;
                let meds = store.active_medications(user_id)?;
                Ok(format::status(total, &recent, &meds))
            }
            Command::Trends => {
                let now = Utc::now();
                let cutoff = now
                    .checked_sub_months(Months::new(TRENDS_WINDOW_MONTHS))
                    .unwrap_or(now);
                let records = self.records.lock().await.records_since(user_id, cutoff)?;
                Ok(format::trends(&records))
            }
            Command::Records => {
                let records = self
                    .records
                    .lock()
                    .await
                    .recent_records(user_id, RECORD_LIST_LIMIT)?;
                Ok(format::records_list(&records))
            }
            Command::Medications => {
                let meds = self.records.lock().await.active_medications(user_id)?;
                Ok(format::medications(&meds))
            }
        }
    }

    async fn record_detail(&self, user_id: &str, record_number: u32) -> Result<String> {
        let records = self
            .records
            .lock()
            .await
            .recent_records(user_id, RECORD_LIST_LIMIT)?;

        match nth_record(&records, record_number) {
            Some(record) => Ok(format::record_detail(record_number, record)),
            None => Ok(format::record_not_found(record_number, records.len())),
        }
    }

    async fn explain_record(&self, user_id: &str, record_number: u32) -> Result<String> {
        let records = self
            .records
            .lock()
            .await
            .recent_records(user_id, RECORD_LIST_LIMIT)?;

        let Some(record) = nth_record(&records, record_number) else {
            return Ok(format::explain_record_not_found(record_number, records.len()));
        };

        let analysis = record.analysis.as_deref().unwrap_or(&record.raw_data);
        let prompt = format!(
            "Please provide a detailed, easy-to-understand explanation of this health record:\n\n\
             {analysis}\n\n\
             Break down what each value means, whether they are normal or concerning, and any recommendations."
        );
        let explanation = self
            .oracle
            .analyze_text(&prompt, None, prompts::EXPLAIN_SYSTEM_PROMPT)
            .await;

        Ok(format::record_explanation(record_number, record.date, &explanation))
    }

    async fn save_health_entry(&self, user_id: &str, body: &str) -> String {
        let structured = self
            .oracle
            .extract_structured_data(body, ExtractionKind::Vitals)
            .await;

        let result = self.records.lock().await.insert_record(NewHealthRecord {
            user_id: user_id.to_string(),
            record_type: RecordType::Vitals,
            date: Utc::now(),
            source_type: SourceType::Text,
            raw_data: body.to_string(),
            structured_data: Some(serde_json::Value::Object(structured)),
            analysis: None,
        });

        match result {
            Ok(id) => {
                info!(user_id = %user_id, record_id = %id, "vitals entry saved");
                format::health_entry_saved(body)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "vitals entry save failed");
                format::HEALTH_ENTRY_APOLOGY.to_string()
            }
        }
    }

    async fn answer_question(&self, user_id: &str, question: &str) -> Result<String> {
        let mut history = self
            .users
            .lock()
            .await
            .recent_messages(user_id, QUESTION_HISTORY_LIMIT)?;

        // The inbound message was logged before dispatch; drop it from the
        // history so the oracle does not see the question twice.
        if history
            .last()
            .is_some_and(|m| m.role == ConversationRole::User && m.content == question)
        {
            history.pop();
        }

        let (records, meds) = {
            let store = self.records.lock().await;
            (
                store.recent_records(user_id, CONTEXT_RECORD_LIMIT)?,
                store.active_medications(user_id)?,
            )
        };
        let health_context = build_health_context(&records, &meds);

        Ok(self
            .oracle
            .chat_with_context(question, &history, health_context.as_deref())
            .await)
    }

    /// Push a message straight through the sender, bypassing the webhook
    /// reply and the conversation log. Delivery problems are logged only.
    async fn send_direct(&self, to: &str, body: &str) {
        match self.sender.send_message(to, body, None).await {
            Ok(true) => {}
            Ok(false) => warn!(to = %to, "direct message was not accepted"),
            Err(e) => warn!(to = %to, error = %e, "direct message failed"),
        }
    }
}

/// Record numbers are 1-based positions in the descending list; zero and
/// past-the-end selectors yield None.
fn nth_record(records: &[HealthRecord], record_number: u32) -> Option<&HealthRecord> {
    record_number
        .checked_sub(1)
        .and_then(|i| records.get(i as usize))
}
