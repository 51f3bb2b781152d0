//! Long-message splitting for WhatsApp delivery.

/// WhatsApp delivery ceiling per message, with headroom below Twilio's
/// 1600-character hard limit for chunk prefixes.
pub const MAX_MESSAGE_LEN: usize = 1500;

/// Split a message into chunks no longer than [`MAX_MESSAGE_LEN`] characters.
///
/// Prefers paragraph boundaries, falls back to sentence boundaries inside
/// oversized paragraphs, and hard-cuts only when a single sentence exceeds
/// the limit. Short messages come back as a single chunk untouched.
pub fn split_message(text: &str) -> Vec<String> {
    if char_len(text) <= MAX_MESSAGE_LEN {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        if char_len(paragraph) > MAX_MESSAGE_LEN {
            flush(&mut current, &mut chunks);
            split_paragraph(paragraph, &mut chunks);
        } else if current.is_empty() {
            current.push_str(paragraph);
        } else if char_len(&current) + 2 + char_len(paragraph) <= MAX_MESSAGE_LEN {
            current.push_str("\n\n");
            current.push_str(paragraph);
        } else {
            flush(&mut current, &mut chunks);
            current.push_str(paragraph);
        }
    }
    flush(&mut current, &mut chunks);
    chunks
}

fn split_paragraph(paragraph: &str, chunks: &mut Vec<String>) {
    let mut current = String::new();
    for sentence in SentenceIter::new(paragraph) {
        if char_len(sentence) > MAX_MESSAGE_LEN {
            flush(&mut current, chunks);
            hard_cut(sentence, chunks);
        } else if char_len(&current) + char_len(sentence) <= MAX_MESSAGE_LEN {
            current.push_str(sentence);
        } else {
            flush(&mut current, chunks);
            current.push_str(sentence);
        }
    }
    flush(&mut current, chunks);
}

/// Cut at fixed character counts. Last resort for sentence-free walls of text.
fn hard_cut(text: &str, chunks: &mut Vec<String>) {
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == MAX_MESSAGE_LEN {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    flush(&mut current, chunks);
}

fn flush(current: &mut String, chunks: &mut Vec<String>) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Yields sentences ending in ". " with the separator attached, so that
/// concatenating the pieces reproduces the input exactly.
struct SentenceIter<'a> {
    rest: &'a str,
}

impl<'a> SentenceIter<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for SentenceIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        match self.rest.find(". ") {
            Some(idx) => {
                let (sentence, rest) = self.rest.split_at(idx + 2);
                self.rest = rest;
                Some(sentence)
            }
            None => {
                let sentence = self.rest;
                self.rest = "";
                Some(sentence)
            }
        }
    }
}
