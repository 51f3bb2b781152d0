use ammi_common::{ConversationMessage, ConversationRole};
use base64::Engine;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::prompts;
use crate::providers::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, MessagePart,
};

/// Fallback reply used whenever the provider fails. Callers always get a
/// usable string back; failures surface only in logs.
pub const ANALYSIS_APOLOGY: &str =
    "I'm having trouble processing that right now. Please try again later.";
pub const IMAGE_APOLOGY: &str =
    "I couldn't read that image right now. Please try again later.";
pub const CHAT_APOLOGY: &str =
    "I'm having trouble responding right now. Please try again in a moment.";

/// How many prior conversation turns accompany a contextual chat request.
const CHAT_HISTORY_WINDOW: usize = 10;

/// Which structured-extraction template to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    BloodWork,
    Vitals,
    Medication,
    Imaging,
}

impl ExtractionKind {
    fn prompt(self) -> &'static str {
        match self {
            Self::BloodWork => prompts::BLOOD_WORK_EXTRACTION_PROMPT,
            Self::Vitals => prompts::VITALS_EXTRACTION_PROMPT,
            Self::Medication => prompts::MEDICATION_EXTRACTION_PROMPT,
            Self::Imaging => prompts::IMAGING_EXTRACTION_PROMPT,
        }
    }
}

/// High-level LLM interface. Wraps a provider and exposes the four analysis
/// operations the assistant needs. None of the public methods return errors;
/// each degrades to a fixed apology (or empty map) so callers stay simple.
pub struct Oracle {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl Oracle {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String, max_tokens: u32) -> Self {
        Self {
            provider,
            model,
            max_tokens,
        }
    }

    fn request(&self, messages: Vec<ChatMessage>, system: &str) -> LlmRequest {
        LlmRequest {
            model: self.model.clone(),
            messages,
            system: Some(system.to_string()),
            max_tokens: self.max_tokens,
        }
    }

    /// Analyze free text with an optional prefixed context blob.
    pub async fn analyze_text(&self, text: &str, context: Option<&str>, system: &str) -> String {
        let content = match context {
            Some(ctx) => format!("{ctx}\n\n{text}"),
            None => text.to_string(),
        };
        let request = self.request(vec![ChatMessage::text(ChatRole::User, content)], system);

        match self.provider.complete(&request).await {
            Ok(response) => response.text(),
            Err(e) => {
                warn!(error = %e, "text analysis failed");
                ANALYSIS_APOLOGY.to_string()
            }
        }
    }

    /// Analyze an image (report photo, prescription scan). Bytes are sent
    /// inline as base64 alongside the prompt.
    pub async fn analyze_image(&self, bytes: &[u8], media_type: &str, prompt: &str) -> String {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        let message = ChatMessage {
            role: ChatRole::User,
            content: MessagePart::Parts(vec![
                ContentBlock::Image {
                    media_type: media_type.to_string(),
                    data,
                },
                ContentBlock::Text {
                    text: prompt.to_string(),
                },
            ]),
        };
        let request = self.request(vec![message], prompts::IMAGE_SYSTEM_PROMPT);

        match self.provider.complete(&request).await {
            Ok(response) => response.text(),
            Err(e) => {
                warn!(error = %e, "image analysis failed");
                IMAGE_APOLOGY.to_string()
            }
        }
    }

    /// Chat with recent conversation history and an optional health-context
    /// summary folded into the system prompt.
    pub async fn chat_with_context(
        &self,
        message: &str,
        history: &[ConversationMessage],
        health_context: Option<&str>,
    ) -> String {
        let system = match health_context {
            Some(ctx) => format!("{}\n\nUser's health context:\n{ctx}", prompts::CHAT_SYSTEM_PROMPT),
            None => prompts::CHAT_SYSTEM_PROMPT.to_string(),
        };

        let recent = if history.len() > CHAT_HISTORY_WINDOW {
            &history[history.len() - CHAT_HISTORY_WINDOW..]
        } else {
            history
        };

        let mut messages: Vec<ChatMessage> = recent
            .iter()
            .map(|m| {
                let role = match m.role {
                    ConversationRole::User => ChatRole::User,
                    ConversationRole::Assistant => ChatRole::Assistant,
                };
                ChatMessage::text(role, m.content.clone())
            })
            .collect();
        messages.push(ChatMessage::text(ChatRole::User, message));

        let request = self.request(messages, &system);

        match self.provider.complete(&request).await {
            Ok(response) => response.text(),
            Err(e) => {
                warn!(error = %e, "contextual chat failed");
                CHAT_APOLOGY.to_string()
            }
        }
    }

    /// Extract structured values from free text. Non-JSON model output is
    /// tolerated: code fences are stripped before parsing, and on parse
    /// failure the original text is preserved under `raw_extraction`.
    pub async fn extract_structured_data(
        &self,
        text: &str,
        kind: ExtractionKind,
    ) -> Map<String, Value> {
        let content = format!("{}\n\nText:\n{text}", kind.prompt());
        let request = self.request(
            vec![ChatMessage::text(ChatRole::User, content)],
            prompts::EXTRACTION_SYSTEM_PROMPT,
        );

        let raw = match self.provider.complete(&request).await {
            Ok(response) => response.text(),
            Err(e) => {
                warn!(error = %e, "structured extraction failed");
                return Map::new();
            }
        };

        parse_extraction(&raw)
    }
}

/// Parse model output into a JSON map, stripping code-fence markers first.
/// Anything that still fails to parse (or parses to a non-object) is kept
/// verbatim under `raw_extraction`.
pub fn parse_extraction(raw: &str) -> Map<String, Value> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            debug!(kind = %value_kind(&other), "extraction parsed to non-object");
            raw_fallback(raw)
        }
        Err(_) => raw_fallback(raw),
    }
}

fn raw_fallback(raw: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "raw_extraction".to_string(),
        Value::String(raw.to_string()),
    );
    map
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Remove surrounding markdown code fences (``` or ```json) if present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ammi_common::{Error, Result};
    use async_trait::async_trait;
    use crate::providers::LlmResponse;
    use std::sync::Mutex;

    struct ScriptedProvider {
        replies: Mutex<Vec<Result<String>>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_id(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self.replies.lock().unwrap().remove(0);
            reply.map(|text| LlmResponse {
                content: vec![ContentBlock::Text { text }],
                model: "scripted".to_string(),
                usage: None,
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn oracle_with(replies: Vec<Result<String>>) -> (Oracle, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(replies));
        let oracle = Oracle::new(provider.clone(), "test-model".to_string(), 1024);
        (oracle, provider)
    }

    #[test]
    fn strips_plain_code_fences() {
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn strips_json_tagged_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn parse_extraction_accepts_fenced_json() {
        let map = parse_extraction("```json\n{\"blood_sugar\": 95}\n```");
        assert_eq!(map["blood_sugar"], 95);
    }

    #[test]
    fn parse_extraction_falls_back_to_raw() {
        let map = parse_extraction("sugar was fine, nothing to extract");
        assert_eq!(
            map["raw_extraction"],
            "sugar was fine, nothing to extract"
        );
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn parse_extraction_wraps_non_object_json() {
        let map = parse_extraction("[1, 2, 3]");
        assert_eq!(map["raw_extraction"], "[1, 2, 3]");
    }

    #[test]
    fn parse_extraction_is_idempotent_on_garbage() {
        let first = parse_extraction("not json");
        let second = parse_extraction("not json");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn analyze_text_returns_apology_on_failure() {
        let (oracle, _) = oracle_with(vec![Err(Error::Oracle("boom".to_string()))]);
        let reply = oracle
            .analyze_text("hello", None, prompts::ASSISTANT_SYSTEM_PROMPT)
            .await;
        assert_eq!(reply, ANALYSIS_APOLOGY);
    }

    #[tokio::test]
    async fn analyze_text_prefixes_context() {
        let (oracle, provider) = oracle_with(vec![Ok("fine".to_string())]);
        oracle
            .analyze_text("bp 120/80", Some("Recent records:"), prompts::ASSISTANT_SYSTEM_PROMPT)
            .await;

        let requests = provider.requests.lock().unwrap();
        match &requests[0].messages[0].content {
            MessagePart::Text(text) => {
                assert!(text.starts_with("Recent records:"));
                assert!(text.ends_with("bp 120/80"));
            }
            _ => panic!("expected text content"),
        }
    }

    #[tokio::test]
    async fn chat_trims_history_to_window() {
        let (oracle, provider) = oracle_with(vec![Ok("hi".to_string())]);
        let history: Vec<ConversationMessage> = (0..25)
            .map(|i| ConversationMessage::new(ConversationRole::User, format!("msg {i}")))
            .collect();

        oracle.chat_with_context("latest", &history, None).await;

        let requests = provider.requests.lock().unwrap();
        // 10 history turns plus the current message.
        assert_eq!(requests[0].messages.len(), 11);
        match &requests[0].messages[0].content {
            MessagePart::Text(text) => assert_eq!(text, "msg 15"),
            _ => panic!("expected text content"),
        }
    }

    #[tokio::test]
    async fn chat_folds_health_context_into_system() {
        let (oracle, provider) = oracle_with(vec![Ok("hi".to_string())]);
        oracle
            .chat_with_context("how am I doing?", &[], Some("Blood sugar: 95"))
            .await;

        let requests = provider.requests.lock().unwrap();
        let system = requests[0].system.as_deref().unwrap();
        assert!(system.contains("Blood sugar: 95"));
    }

    #[tokio::test]
    async fn extraction_returns_empty_map_on_provider_error() {
        let (oracle, _) = oracle_with(vec![Err(Error::Oracle("down".to_string()))]);
        let map = oracle
            .extract_structured_data("some text", ExtractionKind::Vitals)
            .await;
        assert!(map.is_empty());
    }
}
