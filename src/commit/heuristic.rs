//! Deterministic scorer used when the judge cannot score a message.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::conventional::ConventionalCommit;
use crate::eval::{AttemptMetrics, MAX_SCORE};

static DIFF_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:\+\+\+ b/|--- a/|diff --git a/)(\S+)").expect("valid diff path regex")
});

static SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:fn|def|class|function|func|struct|enum|trait|interface|impl|type|const)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("valid symbol regex")
});

/// Subjects that say nothing about the change.
const FILLER_SUBJECTS: &[&str] = &[
    "update", "updates", "change", "changes", "fix", "fixes", "wip", "misc", "stuff", "cleanup",
    "tweak", "tweaks", "minor",
];

/// Header length above which readability suffers.
const COMFORTABLE_HEADER_LEN: usize = 72;

/// File names, file stems and declared symbols touched by a unified diff.
pub fn touched_identifiers(diff: &str) -> HashSet<String> {
    let mut identifiers = HashSet::new();

    for caps in DIFF_PATH.captures_iter(diff) {
        let path = &caps[1];
        if path == "/dev/null" {
            continue;
        }
        if let Some(file_name) = path.rsplit('/').next() {
            identifiers.insert(file_name.to_lowercase());
            if let Some((stem, _)) = file_name.rsplit_once('.') {
                identifiers.insert(stem.to_lowercase());
            }
        }
    }

    for line in diff.lines().filter(|l| l.starts_with('+') || l.starts_with('-')) {
        for caps in SYMBOL.captures_iter(line) {
            identifiers.insert(caps[1].to_lowercase());
        }
    }

    identifiers.retain(|id| id.len() >= 3);
    identifiers
}

/// Score a validated commit against the fixture's diff and expected type.
///
/// Every dimension is clamped to `[0, 10]`.
pub fn score_heuristically(
    commit: &ConventionalCommit,
    diff: &str,
    expected_type: &str,
) -> AttemptMetrics {
    let header_len = commit.header().chars().count();
    let subject_lower = commit.subject.to_lowercase();
    let subject_words = commit.subject.split_whitespace().count();

    let mut clarity = MAX_SCORE;
    if header_len > COMFORTABLE_HEADER_LEN {
        clarity -= 2.0;
    }
    if FILLER_SUBJECTS.contains(&subject_lower.trim()) {
        clarity -= 4.0;
    } else if subject_words < 3 {
        clarity -= 2.0;
    }
    if commit
        .subject
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase())
    {
        clarity -= 1.0;
    }

    let mut conventional_format = MAX_SCORE;
    if commit.scope.is_none() {
        conventional_format -= 1.0;
    }

    let mut scope = 5.0;
    if commit.scope.is_some() {
        scope += 2.5;
    }
    let expected = expected_type.trim().to_lowercase();
    if expected.is_empty() {
        scope += 1.0;
    } else if expected == commit.commit_type {
        scope += 2.5;
    }

    let mut specificity = 4.0;
    let identifiers = touched_identifiers(diff);
    let mut text = subject_lower.clone();
    if let Some(scope_name) = &commit.scope {
        text.push(' ');
        text.push_str(&scope_name.to_lowercase());
    }
    if identifiers.iter().any(|id| text.contains(id.as_str())) {
        specificity += 3.0;
    }
    if commit.body.is_some() {
        specificity += 2.0;
    }
    if subject_words >= 4 {
        specificity += 1.0;
    }

    let clamp = |v: f64| v.clamp(0.0, MAX_SCORE);
    AttemptMetrics::new(
        clamp(clarity),
        clamp(conventional_format),
        clamp(scope),
        clamp(specificity),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "diff --git a/src/parser.rs b/src/parser.rs\n--- a/src/parser.rs\n+++ b/src/parser.rs\n@@ -1,3 +1,6 @@\n+fn parse_group(input: &str) -> Group {\n+    todo!()\n+}\n";

    fn parse(message: &str) -> ConventionalCommit {
        ConventionalCommit::parse(message).expect("valid commit")
    }

    #[test]
    fn test_touched_identifiers() {
        let ids = touched_identifiers(DIFF);
        assert!(ids.contains("parser"));
        assert!(ids.contains("parser.rs"));
        assert!(ids.contains("parse_group"));
    }

    #[test]
    fn test_specific_scoped_message_scores_high() {
        let commit = parse("feat(parser): add parse_group for nested input\n\nHandles recursion.");
        let metrics = score_heuristically(&commit, DIFF, "feat");
        assert_eq!(metrics.conventional_format, 10.0);
        assert_eq!(metrics.scope, 10.0);
        assert_eq!(metrics.specificity, 10.0);
        assert_eq!(metrics.clarity, 10.0);
        assert!(metrics.validate().is_ok());
    }

    #[test]
    fn test_vague_message_scores_lower() {
        let vague = parse("chore: update");
        let specific = parse("feat(parser): add parse_group for nested input");
        let vague_score = score_heuristically(&vague, DIFF, "feat").overall();
        let specific_score = score_heuristically(&specific, DIFF, "feat").overall();
        assert!(vague_score < specific_score);
    }

    #[test]
    fn test_deterministic() {
        let commit = parse("fix(parser): reject empty groups");
        assert_eq!(
            score_heuristically(&commit, DIFF, "fix"),
            score_heuristically(&commit, DIFF, "fix")
        );
    }

    #[test]
    fn test_scores_stay_in_range() {
        let commit = parse(&format!("fix: {}", "Word ".repeat(18).trim()));
        let metrics = score_heuristically(&commit, "", "");
        assert!(metrics.validate().is_ok());
    }
}
