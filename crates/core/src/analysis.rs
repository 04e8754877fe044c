// crates/core/src/analysis.rs
//! Typed parse step for LLM analysis responses.
//!
//! Models wrap JSON in markdown fences, prepend chatter, or return garbage.
//! None of that may escape as a panic: `parse_analysis` always returns a
//! `ParsedAnalysis` the caller can branch on.

use serde_json::Value;

/// Characters of raw response kept for diagnostics.
pub const SNIPPET_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAnalysis {
    Document(Value),
    Invalid { error: String, snippet: String },
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Strip a leading ```` ```<lang> ```` fence and everything from the closing
/// fence on. Text without a leading fence is returned trimmed.
pub fn strip_code_fence<'a>(text: &'a str, lang: &str) -> &'a str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix(lang).unwrap_or(rest);
    let body = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    body.trim()
}

/// Parse an analysis response into a JSON object.
pub fn parse_analysis(raw: &str) -> ParsedAnalysis {
    let body = strip_code_fence(raw, "json");
    match serde_json::from_str::<Value>(body) {
        Ok(doc @ Value::Object(_)) => ParsedAnalysis::Document(doc),
        Ok(_) => ParsedAnalysis::Invalid {
            error: "analysis response is not a JSON object".to_string(),
            snippet: snippet(raw, SNIPPET_CHARS).to_string(),
        },
        Err(e) => ParsedAnalysis::Invalid {
            error: e.to_string(),
            snippet: snippet(raw, SNIPPET_CHARS).to_string(),
        },
    }
}
