// Shared prompt constants.
// The screener and the decision engine each keep their own prompts.rs alongside them.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured hiring assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Resume text beyond this many characters is not sent to the model.
pub const MAX_RESUME_CHARS: usize = 8000;

/// Cuts `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// "a, b, c". Empty input renders as "None specified".
pub fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None specified".to_string()
    } else {
        items.join(", ")
    }
}
