use std::sync::LazyLock;

use regex::Regex;

/// Maximum user free-text length in bytes before truncation.
pub const MAX_INPUT_LENGTH: usize = 2_000;

/// Result of cleaning user free text before it is embedded in a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedInput {
    pub text: String,
    pub was_modified: bool,
}

/// Clean user free text: drop invisible Unicode and control characters,
/// neutralize prompt-injection markers, truncate at a word boundary.
/// Deterministic: the same input always yields the same output.
pub fn sanitize_user_text(raw: &str, max_length: usize) -> SanitizedInput {
    let mut text = neutralize_prompt_markers(&strip_hidden_characters(raw));
    if text.len() > max_length {
        text = truncate_at_word_boundary(&text, max_length);
    }
    let text = text.trim().to_string();
    let was_modified = text != raw.trim();
    if was_modified {
        tracing::debug!(
            original_len = raw.len(),
            sanitized_len = text.len(),
            "User input modified before prompting"
        );
    }
    SanitizedInput { text, was_modified }
}

/// Sanitize with the default length limit.
pub fn sanitize(raw: &str) -> String {
    sanitize_user_text(raw, MAX_INPUT_LENGTH).text
}

/// Control characters other than newline and tab, plus zero-width, bidi
/// override and soft-hyphen characters that hide text from the reader.
fn is_hidden(c: char) -> bool {
    (c.is_control() && c != '\n' && c != '\t')
        || matches!(
            c,
            '\u{00AD}' | '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2069}' | '\u{FEFF}'
        )
}

fn strip_hidden_characters(text: &str) -> String {
    text.chars().filter(|c| !is_hidden(*c)).collect()
}

/// Speaker labels only count at the start of a line, where they would read
/// as a new turn in the chat transcript. "immune system: weak" is left alone.
static PROMPT_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?im)^[ \t]*(?:system|assistant|user|human)[ \t]*:",
        r"(?i)\b(?:ignore|disregard)\s+(?:all\s+)?(?:previous|prior|above|earlier)\s+(?:instructions?|rules?|prompts?)",
        r"(?i)\byou\s+are\s+now\s+(?:a|an)\b",
        r"<<SYS>>|\[/?INST\]|<\|im_(?:start|end)\|>",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

fn neutralize_prompt_markers(text: &str) -> String {
    PROMPT_MARKERS
        .iter()
        .fold(text.to_string(), |acc, pattern| {
            pattern.replace_all(&acc, "[FILTERED]").into_owned()
        })
}

/// Truncate to at most `max` bytes, backing off to a char boundary and then
/// to the last whitespace.
fn truncate_at_word_boundary(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &text[..end];
    match truncated.rfind(char::is_whitespace) {
        Some(pos) => truncated[..pos].to_string(),
        None => truncated.to_string(),
    }
}
