/// Normalize a sender identifier to a bare E.164-style number.
///
/// Strips the `whatsapp:` prefix, removes spaces, dashes, and parentheses,
/// and ensures a leading `+`. Normalized numbers are the user identity key.
pub fn normalize_phone(phone: &str) -> String {
    let stripped = phone.strip_prefix("whatsapp:").unwrap_or(phone);
    let cleaned: String = stripped
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if cleaned.starts_with('+') {
        cleaned
    } else {
        format!("+{cleaned}")
    }
}

/// Basic international phone number check: optional `+`, a nonzero leading
/// digit, and 2 to 15 digits total.
pub fn is_valid_phone(phone: &str) -> bool {
    let cleaned = phone.strip_prefix("whatsapp:").unwrap_or(phone);
    let digits = cleaned.strip_prefix('+').unwrap_or(cleaned);
    let len = digits.len();
    (2..=15).contains(&len)
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}
