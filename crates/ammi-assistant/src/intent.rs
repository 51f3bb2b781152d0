//! Pure classification predicates for the intent router.
//!
//! Every function here takes an immutable snapshot (the message text,
//! optionally a bounded history slice) and touches no shared state, so
//! each heuristic is testable on its own.

use ammi_common::{ConversationMessage, ConversationRole};
use regex::Regex;
use std::sync::OnceLock;

use crate::format::{DETAILS_MARKER, RECORDS_MARKER};

/// Anything longer than this is not treated as a name during onboarding.
const NAME_MAX_CHARS: usize = 99;
const NAME_MAX_TOKENS: usize = 5;

/// Record selectors are capped at the list size shown by /records.
pub const MAX_RECORD_SELECTOR: u32 = 10;

/// How many trailing conversation messages the numeric disambiguation
/// looks at.
pub const LOOKBACK_WINDOW: usize = 3;

const NAME_PREFIXES: [&str; 4] = ["my name is", "my name's", "i am", "i'm"];

const HEALTH_KEYWORDS: [&str; 12] = [
    "bp:",
    "blood pressure:",
    "weight:",
    "height:",
    "sugar:",
    "glucose:",
    "temperature:",
    "temp:",
    "pulse:",
    "heart rate:",
    "spo2:",
    "oxygen:",
];

/// Whether an onboarding reply plausibly is the user's name: short, not a
/// command, not a question, and either carrying a recognized introduction
/// prefix or at most a few tokens.
pub fn looks_like_name(message: &str) -> bool {
    let trimmed = message.trim();
    if trimmed.is_empty() || trimmed.chars().count() > NAME_MAX_CHARS {
        return false;
    }

    let lower = trimmed.to_lowercase();
    if lower.starts_with("my name") || lower.starts_with("i am") || lower.starts_with("i'm") {
        return true;
    }

    !lower.starts_with('/')
        && !lower.contains('?')
        && trimmed.split_whitespace().count() <= NAME_MAX_TOKENS
}

/// Strip a recognized introduction prefix and return the bare name.
/// Returns None if nothing usable remains.
pub fn extract_name(message: &str) -> Option<String> {
    let trimmed = message.trim();
    let lower = trimmed.to_lowercase();

    for prefix in NAME_PREFIXES {
        if lower.starts_with(prefix) {
            let name = trimmed[prefix.len()..].trim();
            return (!name.is_empty()).then(|| name.to_string());
        }
    }

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Vital-sign entries are recognized by keyword substrings like "bp:" or
/// "weight:", anywhere in the message, case-insensitive.
pub fn is_health_data_entry(message: &str) -> bool {
    let lower = message.to_lowercase();
    HEALTH_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// A bare numeric token within record-selector range.
pub fn parse_numeric_selector(message: &str) -> Option<u32> {
    message
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|n| (1..=MAX_RECORD_SELECTOR).contains(n))
}

/// Match "explain record #N" (case-insensitive, `#` optional) anywhere in
/// the message.
pub fn parse_explain_record(message: &str) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)explain\s+record\s*#?(\d+)").unwrap_or_else(|_| unreachable!())
    });
    re.captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Whether the user was just shown a record list, judged from the last two
/// assistant messages in the lookback window. Decides if a bare number is
/// a record selector or a menu choice.
pub fn recently_viewed_records(history: &[ConversationMessage]) -> bool {
    let window_start = history.len().saturating_sub(LOOKBACK_WINDOW);
    history[window_start..]
        .iter()
        .filter(|m| m.role == ConversationRole::Assistant)
        .rev()
        .take(2)
        .any(|m| m.content.contains(RECORDS_MARKER) || m.content.contains(DETAILS_MARKER))
}
