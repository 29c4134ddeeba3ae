//! Normalisation of raw agent output into a candidate commit message.
//!
//! Agents wrap messages in terminal colour codes, Markdown fences, sentinel
//! tags and chatty preambles. [`clean_message`] peels those layers off;
//! [`find_artifact`] reports anything that survived.

use regex::Regex;
use std::sync::LazyLock;

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07").expect("valid ANSI regex")
});

static SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(commit(?:_message|-message)?)>\s*(.*?)\s*</commit(?:_message|-message)?>")
        .expect("valid sentinel regex")
});

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?[ \t]*```").expect("valid fence regex")
});

static PREAMBLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:here(?:'s| is| are)\b.*|(?:the |suggested |proposed )?commit message)\s*:\s*|(?:sure|certainly|okay|ok|done)\s*[!.,]?\s*)$",
    )
    .expect("valid preamble regex")
});

static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:the |suggested |proposed )?commit message\s*:\s+(\S.*)$")
        .expect("valid label regex")
});

static CHATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(?:here(?:'s| is| are)\b|i(?:'ve| have| will|'ll| can)\b|let me\b|as an ai\b|i'm going to\b)",
    )
    .expect("valid chatter regex")
});

/// Strip transport noise from raw generator output.
///
/// Returns an empty string when nothing is left.
pub fn clean_message(raw: &str) -> String {
    let mut text = ANSI.replace_all(raw, "").replace("\r\n", "\n");
    text = text.trim().to_string();

    if let Some(inner) = SENTINEL
        .captures(&text)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
    {
        text = inner;
    }

    if let Some(inner) = FENCE
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
    {
        text = inner;
    }

    let mut lines: Vec<&str> = text.lines().collect();
    while let Some(first) = lines.first() {
        if first.trim().is_empty() || PREAMBLE_LINE.is_match(first) {
            lines.remove(0);
        } else {
            break;
        }
    }

    let mut cleaned: Vec<String> = lines.iter().map(|l| l.trim_end().to_string()).collect();
    if let Some(first) = cleaned.first_mut() {
        if let Some(rest) = LABEL_PREFIX
            .captures(first)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        {
            *first = rest;
        }
    }

    let joined = cleaned.join("\n");
    strip_wrapping_quotes(joined.trim()).trim().to_string()
}

fn strip_wrapping_quotes(text: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Describe the first artifact left in a cleaned message, if any.
pub fn find_artifact(cleaned: &str) -> Option<String> {
    if cleaned.contains('\x1b') {
        return Some("terminal escape sequence".to_string());
    }
    if cleaned.contains("```") {
        return Some("unbalanced code fence".to_string());
    }
    if cleaned.contains("<commit") || cleaned.contains("</commit") {
        return Some("sentinel tag".to_string());
    }
    if let Some(m) = CHATTER.find(cleaned) {
        let line = cleaned[m.start()..].lines().next().unwrap_or_default();
        return Some(format!("conversational preamble: '{}'", line.trim()));
    }
    None
}
