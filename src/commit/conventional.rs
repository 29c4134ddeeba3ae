//! Structural validation of Conventional Commits headers and bodies.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Commit types accepted in the header.
pub const ALLOWED_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// Maximum header length in characters.
pub const MAX_HEADER_LEN: usize = 100;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[A-Za-z]+)(?:\((?P<scope>[^()]*)\))?(?P<breaking>!)?:(?P<subject>.*)$")
        .expect("valid header regex")
});

/// Why a message is not a structurally valid conventional commit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("message is empty")]
    Empty,

    #[error("header '{0}' does not match 'type(scope): subject'")]
    MalformedHeader(String),

    #[error("unknown commit type '{0}'")]
    UnknownType(String),

    #[error("scope is empty")]
    EmptyScope,

    #[error("subject is empty")]
    EmptySubject,

    #[error("subject ends with a period")]
    TrailingPeriod,

    #[error("header is {0} characters long (max 100)")]
    HeaderTooLong(usize),

    #[error("body is not separated from the header by a blank line")]
    MissingBlankLine,
}

/// A parsed conventional commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
    pub commit_type: String,
    pub scope: Option<String>,
    pub breaking: bool,
    pub subject: String,
    pub body: Option<String>,
}

impl ConventionalCommit {
    /// Parse and validate a cleaned commit message.
    pub fn parse(message: &str) -> Result<Self, ValidationIssue> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationIssue::Empty);
        }

        let mut lines = message.lines();
        let header = lines.next().unwrap_or_default().trim_end();

        let header_len = header.chars().count();
        if header_len > MAX_HEADER_LEN {
            return Err(ValidationIssue::HeaderTooLong(header_len));
        }

        let caps = HEADER
            .captures(header)
            .ok_or_else(|| ValidationIssue::MalformedHeader(header.to_string()))?;

        let commit_type = caps["type"].to_string();
        if !ALLOWED_TYPES.contains(&commit_type.as_str()) {
            return Err(ValidationIssue::UnknownType(commit_type));
        }

        let scope = match caps.name("scope").map(|m| m.as_str().trim()) {
            Some("") => return Err(ValidationIssue::EmptyScope),
            Some(scope) => Some(scope.to_string()),
            None => None,
        };

        let raw_subject = &caps["subject"];
        let subject = raw_subject.trim().to_string();
        if subject.is_empty() {
            return Err(ValidationIssue::EmptySubject);
        }
        if !raw_subject.starts_with(' ') {
            return Err(ValidationIssue::MalformedHeader(header.to_string()));
        }
        if subject.ends_with('.') {
            return Err(ValidationIssue::TrailingPeriod);
        }

        let rest: Vec<&str> = lines.collect();
        let body = match rest.split_first() {
            None => None,
            Some((separator, body_lines)) => {
                if !separator.trim().is_empty() {
                    return Err(ValidationIssue::MissingBlankLine);
                }
                let body = body_lines.join("\n").trim().to_string();
                (!body.is_empty()).then_some(body)
            }
        };

        Ok(Self {
            commit_type,
            scope,
            breaking: caps.name("breaking").is_some(),
            subject,
            body,
        })
    }

    /// Reconstruct the header line.
    pub fn header(&self) -> String {
        let scope = self
            .scope
            .as_ref()
            .map(|s| format!("({})", s))
            .unwrap_or_default();
        let bang = if self.breaking { "!" } else { "" };
        format!("{}{}{}: {}", self.commit_type, scope, bang, self.subject)
    }
}

impl fmt::Display for ConventionalCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())?;
        if let Some(body) = &self.body {
            write!(f, "\n\n{}", body)?;
        }
        Ok(())
    }
}
