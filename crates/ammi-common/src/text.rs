/// Truncate text to `max_len` characters, appending an ellipsis when cut.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_unchanged() {
        assert_eq!(truncate_text("hello", 100), "hello");
    }

    #[test]
    fn long_text_cut_with_ellipsis() {
        let text = "a".repeat(120);
        let truncated = truncate_text(&text, 100);
        assert_eq!(truncated.chars().count(), 100);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn exact_length_unchanged() {
        let text = "b".repeat(100);
        assert_eq!(truncate_text(&text, 100), text);
    }
}
