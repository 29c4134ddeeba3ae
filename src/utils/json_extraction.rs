//! JSON object extraction from LLM replies.
//!
//! Judge models wrap their JSON in Markdown fences, prefix it with reasoning,
//! or get cut off by the token limit. [`try_extract_json_object`] tries, in
//! order:
//!
//! 1. a fenced code block (```json or bare ```) containing an object;
//! 2. the whole reply when it starts with `{`;
//! 3. the last balanced object in the reply that parses.
//!
//! When an object starts but never closes the result is [`JsonExtraction::Truncated`].
//!
//! ```
//! use commit_eval::utils::json_extraction::try_extract_json_object;
//!
//! let reply = "Scores follow.\n```json\n{\"clarity\": 8}\n```";
//! let json = try_extract_json_object(reply).into_result_with_context(reply).unwrap();
//! assert_eq!(json, "{\"clarity\": 8}");
//! ```

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:[A-Za-z0-9_-]+)?[ \t]*\n?([\s\S]*?)\n?```").expect("valid code block regex")
});

/// Characters of the reply quoted in error messages.
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated ({unclosed_braces} unclosed braces): {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed_braces: usize,
    },

    #[error("No JSON object found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

/// Outcome of an extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtraction {
    /// A complete object that parses as JSON.
    Found(String),
    /// An object starts but is never closed.
    Truncated {
        partial_json: String,
        unclosed_braces: usize,
    },
    NotFound,
}

impl JsonExtraction {
    pub fn is_found(&self) -> bool {
        matches!(self, JsonExtraction::Found(_))
    }

    /// Convert into a `Result`, quoting the start of `content` when nothing was found.
    pub fn into_result_with_context(self, content: &str) -> Result<String, JsonExtractionError> {
        match self {
            JsonExtraction::Found(json) => Ok(json),
            JsonExtraction::Truncated {
                partial_json,
                unclosed_braces,
            } => Err(JsonExtractionError::Truncated {
                partial_preview: preview(&partial_json),
                unclosed_braces,
            }),
            JsonExtraction::NotFound => Err(JsonExtractionError::NotFound {
                content_preview: preview(content.trim()),
            }),
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate)
        .map(|v| v.is_object())
        .unwrap_or(false)
}

/// Index of the `}` closing the object that starts at `s[0]`.
///
/// Braces inside string literals, including escaped quotes, are ignored.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Number of `{` left open at the end of `s`, ignoring string contents.
fn unclosed_braces(s: &str) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// Object inside the first fenced code block, if any.
pub fn extract_from_code_block(content: &str) -> Option<String> {
    for caps in CODE_BLOCK.captures_iter(content) {
        let block = caps.get(1)?.as_str().trim();
        if let Some(start) = block.find('{') {
            if let Some(end) = find_matching_brace(&block[start..]) {
                let candidate = &block[start..=start + end];
                if parses(candidate) {
                    return Some(candidate.to_string());
                }
            }
        }
    }
    None
}

/// The last balanced object in `content` that parses.
///
/// Reasoning text before the answer often contains brace-like fragments, so
/// later objects win.
pub fn extract_last_json_object(content: &str) -> Option<String> {
    let mut best: Option<(usize, usize)> = None;

    for (start, _) in content.match_indices('{') {
        if let Some(len) = find_matching_brace(&content[start..]) {
            let end = start + len;
            // Strictly later end: an enclosing object beats the objects nested in it.
            if best.map_or(true, |(_, best_end)| end > best_end) && parses(&content[start..=end]) {
                best = Some((start, end));
            }
        }
    }

    best.map(|(start, end)| content[start..=end].to_string())
}

/// Locate a JSON object in an LLM reply.
pub fn try_extract_json_object(content: &str) -> JsonExtraction {
    let trimmed = content.trim();

    if let Some(json) = extract_from_code_block(trimmed) {
        return JsonExtraction::Found(json);
    }

    if trimmed.starts_with('{') {
        if let Some(end) = find_matching_brace(trimmed) {
            let candidate = &trimmed[..=end];
            if parses(candidate) {
                return JsonExtraction::Found(candidate.to_string());
            }
        }
    }

    if let Some(json) = extract_last_json_object(trimmed) {
        return JsonExtraction::Found(json);
    }

    if let Some(start) = trimmed.find('{') {
        let tail = &trimmed[start..];
        let open = unclosed_braces(tail);
        if open > 0 {
            return JsonExtraction::Truncated {
                partial_json: tail.to_string(),
                unclosed_braces: open,
            };
        }
    }

    JsonExtraction::NotFound
}
