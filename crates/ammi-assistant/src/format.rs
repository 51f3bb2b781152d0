//! User-facing reply text. All WhatsApp-visible strings live here so the
//! router stays free of formatting concerns.

use ammi_channels::MediaKind;
use ammi_db::{HealthRecord, Medication, RecordType};
use chrono::{DateTime, Utc};

/// Markers that the numeric-disambiguation heuristic looks for in recent
/// assistant messages. Changing these strings changes routing behavior.
pub const RECORDS_MARKER: &str = "Recent Health Records";
pub const DETAILS_MARKER: &str = "Type a number to see details";

pub const GENERIC_APOLOGY: &str = "Sorry, I encountered an error. Please try again.";
pub const QUESTION_APOLOGY: &str =
    "I'm having trouble answering that right now. Please try again.";
pub const HEALTH_ENTRY_APOLOGY: &str =
    "I understood that you're sharing health data, but I had trouble saving it. Please try again.";
pub const MEDIA_APOLOGY: &str =
    "Sorry, I had trouble processing that file. Please try again.";
pub const DOWNLOAD_FAILED: &str =
    "Sorry, I couldn't download that file. Please try again.";
pub const UNSUPPORTED_MEDIA: &str =
    "Sorry, I can only process images and PDF files right now.";
pub const PDF_NO_TEXT: &str = "I couldn't extract text from that PDF. It might be an image-based PDF. \
Could you try sending it as an image instead?";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Type /menu to see all available commands.";

const LIST_PREVIEW_CHARS: usize = 100;
const DETAIL_ANALYSIS_CHARS: usize = 500;

pub fn welcome() -> String {
    "👋 Welcome to Ammi - Your Personal Health Assistant!\n\n\
     I'm here to help you track your health records, analyze reports, and answer questions about your health data.\n\n\
     Here's what I can do:\n\
     📊 Analyze health reports (blood work, vitals, imaging)\n\
     💊 Track medications and send daily reminders\n\
     📈 Show trends in your health metrics\n\
     ❓ Answer questions about your health history\n\n\
     You can:\n\
     • Send me lab reports (PDF or images)\n\
     • Upload prescription images\n\
     • Type health data like \"BP: 120/80, Weight: 70kg\"\n\
     • Ask questions like \"What was my cholesterol last month?\"\n\n\
     Commands:\n\
     Type /menu to see all available commands!\n\n\
     Let's start! What's your name?"
        .to_string()
}

pub fn name_confirmation(name: &str) -> String {
    format!(
        "Nice to meet you, {name}! 👋\n\n\
         I'm ready to help you track your health. You can start by:\n\n\
         • Sending me a health report (photo or PDF)\n\
         • Typing vitals like \"BP: 120/80\"\n\
         • Asking me questions\n\
         • Type /menu to see all commands\n\n\
         What would you like to do?"
    )
}

pub fn help_menu() -> String {
    "📋 *AMMI MENU*\n\n\
     *Quick Commands:*\n\
     Reply with the number or command:\n\n\
     *1.* /status - 📊 View your health summary\n\
     *2.* /trends - 📈 See your health trends\n\
     *3.* /records - 📄 View recent health records\n\
     *4.* /medications - 💊 View your medications\n\n\
     *What I can do:*\n\
     • 📊 Analyze lab reports (PDF or images)\n\
     • 💊 Track medications & send reminders\n\
     • 📈 Track vitals (BP, weight, etc.)\n\
     • ❓ Answer health questions\n\
     • 🔔 Daily medication reminders\n\n\
     *How to use me:*\n\
     • Send photos/PDFs of health reports\n\
     • Type vitals: \"BP: 120/80, Weight: 70kg\"\n\
     • Ask questions: \"What was my last BP reading?\"\n\n\
     Type /menu anytime to see this menu!"
        .to_string()
}

pub fn status(total_records: i64, recent: &[HealthRecord], medications: &[Medication]) -> String {
    let mut out = String::from("📊 *YOUR HEALTH STATUS*\n\n");
    out.push_str(&format!("📈 Total Records: {total_records}\n"));
    out.push_str(&format!("💊 Active Medications: {}\n\n", medications.len()));

    if recent.is_empty() {
        out.push_str("No health records yet.\n");
        out.push_str("Send me a health report to get started!\n\n");
    } else {
        out.push_str("*Recent Health Data:*\n\n");
        for (i, record) in recent.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} - {}\n",
                i + 1,
                short_date(record.date),
                title_case(&record.record_type.label())
            ));
        }
        out.push('\n');
    }

    if !medications.is_empty() {
        out.push_str("*Current Medications:*\n\n");
        for (i, med) in medications.iter().enumerate() {
            out.push_str(&format!("{}. {} - {}\n", i + 1, med.name, med.dosage));
        }
        out.push('\n');
    }

    out.push_str("Type /records to see detailed records\n");
    out.push_str("Type /medications for medication details\n");
    out.push_str("Type /menu for all options");
    out
}

pub fn trends(records: &[HealthRecord]) -> String {
    if records.is_empty() {
        return "📈 *Health Trends*\n\nNo records found in the last 6 months.\n\n\
                Send me health reports to start tracking trends!"
            .to_string();
    }

    let mut out = String::from("📈 *HEALTH TRENDS* (Last 6 Months)\n\n");

    out.push_str("*Records Summary:*\n");
    for (record_type, count) in count_by_type(records) {
        let plural = if count > 1 { "s" } else { "" };
        out.push_str(&format!(
            "• {}: {count} record{plural}\n",
            record_type.label().to_uppercase()
        ));
    }

    out.push_str(&format!("\n*Total Records:* {}\n", records.len()));
    out.push_str("*Period:* Last 6 months\n\n");

    out.push_str("*Most Recent:*\n");
    for (i, record) in records.iter().take(3).enumerate() {
        out.push_str(&format!(
            "{}. {} - {}\n",
            i + 1,
            short_date(record.date),
            record.record_type.label()
        ));
    }

    out.push_str("\n💡 For detailed analysis, ask me:\n");
    out.push_str("\"Show my blood pressure trend\"\n");
    out.push_str("\"Compare my recent reports\"");
    out
}

pub fn records_list(records: &[HealthRecord]) -> String {
    if records.is_empty() {
        return "📄 No health records found yet.\n\n\
                Send me a health report (PDF or image) to get started!"
            .to_string();
    }

    let mut out = format!("📄 *{RECORDS_MARKER}:*\n\n");
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} - {}\n",
            i + 1,
            short_date(record.date),
            record.record_type.label().to_uppercase()
        ));
        if let Some(analysis) = &record.analysis {
            let preview: String = analysis.chars().take(LIST_PREVIEW_CHARS).collect();
            out.push_str(&format!("   {preview}...\n\n"));
        }
    }

    out.push_str(&format!("\n{DETAILS_MARKER}, or send a new report!"));
    out
}

pub fn record_detail(record_number: u32, record: &HealthRecord) -> String {
    let mut out = format!("📄 *RECORD #{record_number}*\n\n");
    out.push_str(&format!("📅 Date: {}\n", long_date(record.date)));
    out.push_str(&format!(
        "📋 Type: {}\n",
        record.record_type.label().to_uppercase()
    ));
    out.push_str(&format!(
        "📎 Source: {}\n\n",
        record.source_type.as_str().to_uppercase()
    ));

    if let Some(analysis) = &record.analysis {
        out.push_str(&format!(
            "*Analysis:*\n{}\n\n",
            clip(analysis, DETAIL_ANALYSIS_CHARS)
        ));
    }

    if let Some(serde_json::Value::Object(map)) = &record.structured_data
        && !map.is_empty()
    {
        out.push_str("*Key Values:*\n");
        for (key, value) in map {
            // The date is already shown in the header.
            if key == "date" || value.is_null() {
                continue;
            }
            out.push_str(&format!(
                "• {}: {}\n",
                key.replace('_', " "),
                value_display(value)
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "💬 For full details, type: \"Explain record #{record_number}\""
    ));
    out
}

pub fn medications(meds: &[Medication]) -> String {
    if meds.is_empty() {
        return "💊 No active medications found.\n\n\
                Send me a prescription image to track your medications!"
            .to_string();
    }

    let mut out = String::from("💊 *Your Active Medications:*\n\n");
    for (i, med) in meds.iter().enumerate() {
        out.push_str(&format!("{}. *{}*\n", i + 1, med.name));
        out.push_str(&format!("   Dosage: {}\n", med.dosage));
        out.push_str(&format!("   Frequency: {}\n", med.frequency));
        if !med.times.is_empty() {
            out.push_str(&format!("   Times: {}\n", med.times.join(", ")));
        }
        if let Some(notes) = &med.notes {
            out.push_str(&format!("   Notes: {notes}\n"));
        }
        out.push('\n');
    }
    out
}

pub fn record_not_found(record_number: u32, total: usize) -> String {
    format!(
        "Record #{record_number} not found. You have {total} record{}.\n\n\
         Type /records to see all records.",
        plural_s(total)
    )
}

pub fn explain_record_not_found(record_number: u32, total: usize) -> String {
    format!(
        "Record #{record_number} not found. You have {total} record{}.",
        plural_s(total)
    )
}

pub fn fetching_record(record_number: u32) -> String {
    format!("⏳ Fetching record #{record_number}...")
}

pub fn explaining_record(record_number: u32) -> String {
    format!("⏳ Getting detailed explanation for record #{record_number}...")
}

pub fn record_explanation(
    record_number: u32,
    date: DateTime<Utc>,
    explanation: &str,
) -> String {
    format!(
        "📄 *DETAILED EXPLANATION - Record #{record_number}*\n\n\
         📅 {}\n\n\
         {explanation}\n\n\
         ⚕️ Remember: Always consult your doctor for medical advice.",
        long_date(date)
    )
}

pub fn media_ack(kind: MediaKind) -> String {
    let file_type = match kind {
        MediaKind::Image => "📸 image",
        MediaKind::Pdf => "📄 PDF",
        MediaKind::Unsupported => "📎 file",
    };
    format!("✅ Got your {file_type}! Analyzing it now... ⏳")
}

pub fn report_saved(analysis: &str) -> String {
    format!(
        "📄 I've analyzed and saved your report:\n\n{analysis}\n\n✅ Saved to your health records."
    )
}

pub fn pdf_report_saved(analysis: &str) -> String {
    format!(
        "📄 I've analyzed and saved your PDF report:\n\n{analysis}\n\n✅ Saved to your health records."
    )
}

pub fn health_entry_saved(original_message: &str) -> String {
    format!(
        "✅ Got it! I've recorded:\n{original_message}\n\n✅ Saved to your health records."
    )
}

fn short_date(date: DateTime<Utc>) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn long_date(date: DateTime<Utc>) -> String {
    date.format("%-d %B %Y").to_string()
}

fn title_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn plural_s(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn value_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn count_by_type(records: &[HealthRecord]) -> Vec<(RecordType, usize)> {
    let mut counts: Vec<(RecordType, usize)> = Vec::new();
    for record in records {
        match counts.iter_mut().find(|(t, _)| *t == record.record_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((record.record_type, 1)),
        }
    }
    counts
}
