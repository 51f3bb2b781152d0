//! End-to-end routing tests against in-memory stores, a scripted LLM
//! provider, and a recording sender.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use ammi_assistant::{MediaItem, MessageHandler, ReplyOutcome};
use ammi_channels::{MediaFetcher, MessageSender};
use ammi_common::Result;
use ammi_db::{NewHealthRecord, RecordStore, RecordType, SourceType, UserStore};
use ammi_oracle::{ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmResponse, Oracle};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

struct MockProvider {
    replies: StdMutex<VecDeque<String>>,
    requests: StdMutex<Vec<LlmRequest>>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            replies: StdMutex::new(VecDeque::new()),
            requests: StdMutex::new(Vec::new()),
        }
    }

    fn queue_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(reply.to_string());
    }

    fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn provider_id(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "mock answer".to_string());
        Ok(LlmResponse {
            content: vec![ContentBlock::Text { text }],
            model: "mock".to_string(),
            usage: None,
            stop_reason: None,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

struct RecordingSender {
    sent: StdMutex<Vec<(String, String)>>,
}

impl RecordingSender {
    fn new() -> Self {
        Self {
            sent: StdMutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_message(&self, to: &str, body: &str, _media_url: Option<&str>) -> Result<bool> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(true)
    }
}

struct TestWorld {
    handler: MessageHandler,
    users: Arc<Mutex<UserStore>>,
    records: Arc<Mutex<RecordStore>>,
    provider: Arc<MockProvider>,
    sender: Arc<RecordingSender>,
}

const PHONE: &str = "whatsapp:+15551234567";

fn world() -> TestWorld {
    let users = Arc::new(Mutex::new(UserStore::in_memory().unwrap()));
    let records = Arc::new(Mutex::new(RecordStore::in_memory().unwrap()));
    let provider = Arc::new(MockProvider::new());
    let sender = Arc::new(RecordingSender::new());
    let oracle = Arc::new(Oracle::new(provider.clone(), "mock".to_string(), 1024));
    let fetcher = Arc::new(MediaFetcher::new("AC123".to_string(), "token".to_string()).unwrap());

    let handler = MessageHandler::new(
        users.clone(),
        records.clone(),
        oracle,
        sender.clone(),
        fetcher,
        "Asia/Kolkata".to_string(),
    );

    TestWorld {
        handler,
        users,
        records,
        provider,
        sender,
    }
}

async fn onboard(world: &TestWorld, name: &str) -> String {
    match world
        .handler
        .handle_incoming(PHONE, &format!("I'm {name}"), None)
        .await
    {
        ReplyOutcome::Send(text) => text,
        ReplyOutcome::AlreadyDelivered => panic!("onboarding should reply synchronously"),
    }
}

async fn user_id(world: &TestWorld) -> String {
    world
        .users
        .lock()
        .await
        .get_or_create_user(PHONE, "Asia/Kolkata")
        .unwrap()
        .id
}

async fn seed_record(world: &TestWorld, raw: &str, analysis: &str) {
    let uid = user_id(world).await;
    world
        .records
        .lock()
        .await
        .insert_record(NewHealthRecord {
            user_id: uid,
            record_type: RecordType::Vitals,
            date: Utc::now(),
            source_type: SourceType::Text,
            raw_data: raw.to_string(),
            structured_data: None,
            analysis: Some(analysis.to_string()),
        })
        .unwrap();
}

fn reply_text(outcome: ReplyOutcome) -> String {
    match outcome {
        ReplyOutcome::Send(text) => text,
        ReplyOutcome::AlreadyDelivered => panic!("expected a synchronous reply"),
    }
}

#[tokio::test]
async fn first_contact_gets_the_welcome_text() {
    let world = world();
    let reply = reply_text(world.handler.handle_incoming(PHONE, "What can you do?", None).await);
    assert!(reply.contains("Welcome to Ammi"));
    assert!(reply.contains("What's your name?"));

    // Onboarding exchanges are not logged.
    let uid = user_id(&world).await;
    let history = world.users.lock().await.recent_messages(&uid, 10).unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn onboarding_captures_prefixed_names() {
    let world = world();
    let reply = reply_text(
        world
            .handler
            .handle_incoming(PHONE, "my name is Raj Kumar", None)
            .await,
    );
    assert!(reply.contains("Nice to meet you, Raj Kumar!"));

    let user = world
        .users
        .lock()
        .await
        .get_or_create_user(PHONE, "UTC")
        .unwrap();
    assert_eq!(user.name, "Raj Kumar");
}

#[tokio::test]
async fn questions_during_onboarding_do_not_become_names() {
    let world = world();
    reply_text(world.handler.handle_incoming(PHONE, "What's the weather?", None).await);

    let user = world
        .users
        .lock()
        .await
        .get_or_create_user(PHONE, "UTC")
        .unwrap();
    assert!(user.name.is_empty());
}

#[tokio::test]
async fn onboarded_user_never_reenters_the_gate() {
    let world = world();
    onboard(&world, "Asha").await;

    let reply = reply_text(world.handler.handle_incoming(PHONE, "/help", None).await);
    assert!(reply.contains("AMMI MENU"));
    assert!(!reply.contains("What's your name?"));
}

#[tokio::test]
async fn unknown_commands_are_rejected_with_a_hint() {
    let world = world();
    onboard(&world, "Asha").await;

    let reply = reply_text(world.handler.handle_incoming(PHONE, "/frobnicate", None).await);
    assert!(reply.contains("Unknown command"));
}

#[tokio::test]
async fn commands_log_both_sides_of_the_exchange() {
    let world = world();
    onboard(&world, "Asha").await;
    reply_text(world.handler.handle_incoming(PHONE, "/help", None).await);

    let uid = user_id(&world).await;
    let history = world.users.lock().await.recent_messages(&uid, 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "/help");
    assert!(history[1].content.contains("AMMI MENU"));
}

#[tokio::test]
async fn bare_digit_without_record_context_is_a_menu_choice() {
    let world = world();
    onboard(&world, "Asha").await;

    let reply = reply_text(world.handler.handle_incoming(PHONE, "2", None).await);
    // 2 maps to /trends; with no records that is the empty-window message.
    assert!(reply.contains("No records found in the last 6 months"));
}

#[tokio::test]
async fn bare_digit_after_record_list_selects_a_record() {
    let world = world();
    onboard(&world, "Asha").await;
    seed_record(&world, "bp: 118/76", "Readings look normal").await;
    seed_record(&world, "bp: 122/81", "Slightly elevated").await;

    reply_text(world.handler.handle_incoming(PHONE, "/records", None).await);
    let outcome = world.handler.handle_incoming(PHONE, "2", None).await;

    assert_eq!(outcome, ReplyOutcome::AlreadyDelivered);
    let sent = world.sender.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("Fetching record #2"));
    // Record #2 is the older of the two.
    assert!(sent[1].1.contains("RECORD #2"));
    assert!(sent[1].1.contains("Readings look normal"));
}

#[tokio::test]
async fn record_numbers_are_descending_by_recency() {
    let world = world();
    onboard(&world, "Asha").await;
    seed_record(&world, "oldest", "oldest analysis").await;
    seed_record(&world, "middle", "middle analysis").await;
    seed_record(&world, "newest", "newest analysis").await;

    reply_text(world.handler.handle_incoming(PHONE, "/records", None).await);
    world.handler.handle_incoming(PHONE, "1", None).await;

    let sent = world.sender.sent();
    assert!(sent.last().unwrap().1.contains("newest analysis"));
}

#[tokio::test]
async fn out_of_range_selector_reports_the_record_count() {
    let world = world();
    onboard(&world, "Asha").await;
    seed_record(&world, "r1", "a1").await;
    seed_record(&world, "r2", "a2").await;
    seed_record(&world, "r3", "a3").await;

    reply_text(world.handler.handle_incoming(PHONE, "/records", None).await);
    let outcome = world.handler.handle_incoming(PHONE, "5", None).await;

    assert_eq!(outcome, ReplyOutcome::AlreadyDelivered);
    let sent = world.sender.sent();
    assert!(sent.last().unwrap().1.contains("Record #5 not found. You have 3 records."));
}

#[tokio::test]
async fn explain_record_sends_explanation_directly() {
    let world = world();
    onboard(&world, "Asha").await;
    seed_record(&world, "bp: 120/80", "BP within normal range").await;
    world.provider.queue_reply("Your blood pressure is healthy.");

    let outcome = world
        .handler
        .handle_incoming(PHONE, "explain record #1", None)
        .await;

    assert_eq!(outcome, ReplyOutcome::AlreadyDelivered);
    let sent = world.sender.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("Getting detailed explanation for record #1"));
    assert!(sent[1].1.contains("DETAILED EXPLANATION - Record #1"));
    assert!(sent[1].1.contains("Your blood pressure is healthy."));
    assert!(sent[1].1.contains("Always consult your doctor"));
}

#[tokio::test]
async fn health_entry_saves_a_vitals_record() {
    let world = world();
    onboard(&world, "Asha").await;
    world
        .provider
        .queue_reply(r#"{"blood_pressure_systolic": 120, "blood_pressure_diastolic": 80}"#);

    let reply = reply_text(
        world
            .handler
            .handle_incoming(PHONE, "BP: 120/80", None)
            .await,
    );
    assert!(reply.contains("I've recorded"));
    assert!(reply.contains("BP: 120/80"));

    let uid = user_id(&world).await;
    let records = world.records.lock().await.recent_records(&uid, 10).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_type, RecordType::Vitals);
    assert_eq!(records[0].source_type, SourceType::Text);
    let structured = records[0].structured_data.as_ref().unwrap();
    assert_eq!(
        structured.get("blood_pressure_systolic").and_then(|v| v.as_i64()),
        Some(120)
    );
}

#[tokio::test]
async fn free_text_goes_to_contextual_chat_without_duplicated_question() {
    let world = world();
    onboard(&world, "Asha").await;
    world.provider.queue_reply("You last logged 120/80.");

    let reply = reply_text(
        world
            .handler
            .handle_incoming(PHONE, "how is my blood pressure lately", None)
            .await,
    );
    assert_eq!(reply, "You last logged 120/80.");

    let requests = world.provider.requests();
    let chat = requests.last().unwrap();
    let question_turns = chat
        .messages
        .iter()
        .filter(|m| {
            m.role == ChatRole::User
                && matches!(&m.content, ammi_oracle::MessagePart::Text(t) if t == "how is my blood pressure lately")
        })
        .count();
    assert_eq!(question_turns, 1);
}

#[tokio::test]
async fn media_message_acks_then_saves_a_record_in_the_background() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        )
        .mount(&server)
        .await;

    let world = world();
    onboard(&world, "Asha").await;
    world.provider.queue_reply("Hemoglobin 13.5, all values normal.");

    let reply = reply_text(
        world
            .handler
            .handle_incoming(
                PHONE,
                "",
                Some(MediaItem {
                    url: format!("{}/media/ME1", server.uri()),
                    content_type: "image/jpeg".to_string(),
                }),
            )
            .await,
    );
    assert!(reply.contains("Got your 📸 image!"));

    let uid = user_id(&world).await;
    let records = wait_for_records(&world, &uid, 1).await;
    assert_eq!(records[0].record_type, RecordType::BloodWork);
    assert_eq!(records[0].source_type, SourceType::Image);
    assert_eq!(
        records[0].analysis.as_deref(),
        Some("Hemoglobin 13.5, all values normal.")
    );

    let sent = world.sender.sent();
    assert!(sent
        .iter()
        .any(|(_, body)| body.contains("I've analyzed and saved your report")));
}

#[tokio::test]
async fn unsupported_media_sends_a_fixed_notice_and_no_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....".to_vec()))
        .mount(&server)
        .await;

    let world = world();
    onboard(&world, "Asha").await;

    reply_text(
        world
            .handler
            .handle_incoming(
                PHONE,
                "",
                Some(MediaItem {
                    url: format!("{}/media/ME2", server.uri()),
                    content_type: "audio/ogg".to_string(),
                }),
            )
            .await,
    );

    let notice = wait_for_send(&world, "only process images and PDF files").await;
    assert!(notice);
    let uid = user_id(&world).await;
    let records = world.records.lock().await.recent_records(&uid, 10).unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn pdf_media_extracts_text_and_saves_a_pdf_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(sample_pdf()),
        )
        .mount(&server)
        .await;

    let world = world();
    onboard(&world, "Asha").await;
    world.provider.queue_reply("Summary: hemoglobin is in range.");

    reply_text(
        world
            .handler
            .handle_incoming(
                PHONE,
                "",
                Some(MediaItem {
                    url: format!("{}/media/ME3", server.uri()),
                    content_type: "application/pdf".to_string(),
                }),
            )
            .await,
    );

    let uid = user_id(&world).await;
    let records = wait_for_records(&world, &uid, 1).await;
    assert_eq!(records[0].source_type, SourceType::Pdf);
    assert!(records[0].raw_data.contains("Hemoglobin"));

    let sent = world.sender.sent();
    assert!(sent
        .iter()
        .any(|(_, body)| body.contains("I've analyzed and saved your PDF report")));
}

#[tokio::test]
async fn download_failure_sends_a_fixed_apology() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let world = world();
    onboard(&world, "Asha").await;

    reply_text(
        world
            .handler
            .handle_incoming(
                PHONE,
                "",
                Some(MediaItem {
                    url: format!("{}/media/gone", server.uri()),
                    content_type: "image/jpeg".to_string(),
                }),
            )
            .await,
    );

    assert!(wait_for_send(&world, "couldn't download that file").await);
}

async fn wait_for_records(
    world: &TestWorld,
    uid: &str,
    expected: usize,
) -> Vec<ammi_db::HealthRecord> {
    for _ in 0..100 {
        let records = world.records.lock().await.recent_records(uid, 10).unwrap();
        if records.len() >= expected {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {expected} record(s)");
}

async fn wait_for_send(world: &TestWorld, needle: &str) -> bool {
    for _ in 0..100 {
        if world.sender.sent().iter().any(|(_, body)| body.contains(needle)) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn sample_pdf() -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal("Hemoglobin 13.5 g/dL")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
