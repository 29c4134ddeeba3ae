//! Filesystem reporter.
//!
//! Layout under the root directory:
//!
//! ```text
//! results/<fixture>/<agent>/<timestamp>.json
//! results/<fixture>/<agent>/latest.json
//! reports/report-<timestamp>.md
//! reports/latest.md
//! reports/comparisons-<timestamp>.json
//! baselines/<fixture>.json
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tera::{Context, Tera};
use tokio::fs;
use tracing::{debug, info};

use super::{BaselineDiff, Reporter};
use crate::error::ReportError;
use crate::eval::{EvalComparison, EvalResult, Winner};

const REPORT_TEMPLATE: &str = r#"# Commit message agent comparison

Generated: {{ generated_at }}

| | Count |
|---|---|
| Fixtures compared | {{ total }} |
| {{ agent_a }} wins | {{ agent_a_wins }} |
| {{ agent_b }} wins | {{ agent_b_wins }} |
| Ties | {{ ties }} |
| Incomplete | {{ incomplete }} |

## Results

| Fixture | {{ agent_a }} | {{ agent_b }} | Winner |
|---|---|---|---|
{% for row in rows -%}
| {{ row.fixture }} | {{ row.agent_a_cell }} | {{ row.agent_b_cell }} | {{ row.winner }} |
{% endfor %}
{% for row in rows %}
### {{ row.fixture }}
{% for side in row.details %}
**{{ side.agent }}**: {% if side.missing %}no result{% else %}final {{ side.final_score }}, success {{ side.success_rate }}, scored by {{ side.scoring }}{% if side.best_message %}

Best attempt ({{ side.best_attempt }}):

```
{{ side.best_message }}
```
{% endif %}

{{ side.reasoning }}{% endif %}
{% endfor %}
{% endfor %}"#;

#[derive(Debug, Serialize)]
struct SideView {
    agent: String,
    missing: bool,
    final_score: String,
    success_rate: String,
    scoring: String,
    best_attempt: Option<u8>,
    best_message: Option<String>,
    reasoning: String,
}

impl SideView {
    fn new(agent: &str, result: Option<&EvalResult>) -> Self {
        match result {
            Some(result) => Self {
                agent: agent.to_string(),
                missing: false,
                final_score: format!("{:.2}", result.final_score()),
                success_rate: result.success_rate().to_string(),
                scoring: result.scoring().to_string(),
                best_attempt: result.best_attempt(),
                best_message: result
                    .best_outcome()
                    .and_then(|o| o.commit_message())
                    .map(str::to_string),
                reasoning: result.reasoning().to_string(),
            },
            None => Self {
                agent: agent.to_string(),
                missing: true,
                final_score: String::new(),
                success_rate: String::new(),
                scoring: String::new(),
                best_attempt: None,
                best_message: None,
                reasoning: String::new(),
            },
        }
    }

    fn cell(&self) -> String {
        if self.missing {
            "n/a".to_string()
        } else {
            format!("{} ({})", self.final_score, self.success_rate)
        }
    }
}

#[derive(Debug, Serialize)]
struct RowView {
    fixture: String,
    agent_a_cell: String,
    agent_b_cell: String,
    winner: String,
    details: Vec<SideView>,
}

#[derive(Debug, Serialize)]
struct ReportView {
    generated_at: String,
    agent_a: String,
    agent_b: String,
    total: usize,
    agent_a_wins: usize,
    agent_b_wins: usize,
    ties: usize,
    incomplete: usize,
    rows: Vec<RowView>,
}

impl ReportView {
    fn new(comparisons: &[EvalComparison], generated_at: DateTime<Utc>) -> Self {
        let count = |w: Winner| comparisons.iter().filter(|c| c.winner == Some(w)).count();
        let (agent_a, agent_b) = comparisons
            .first()
            .map(|c| (c.agent_a.clone(), c.agent_b.clone()))
            .unwrap_or_else(|| ("agent_a".to_string(), "agent_b".to_string()));

        let rows = comparisons
            .iter()
            .map(|c| {
                let a = SideView::new(&c.agent_a, c.agent_a_result.as_ref());
                let b = SideView::new(&c.agent_b, c.agent_b_result.as_ref());
                RowView {
                    fixture: c.fixture.clone(),
                    agent_a_cell: a.cell(),
                    agent_b_cell: b.cell(),
                    winner: c.winner_name().unwrap_or("none").to_string(),
                    details: vec![a, b],
                }
            })
            .collect();

        Self {
            generated_at: generated_at.to_rfc3339(),
            agent_a,
            agent_b,
            total: comparisons.len(),
            agent_a_wins: count(Winner::AgentA),
            agent_b_wins: count(Winner::AgentB),
            ties: count(Winner::Tie),
            incomplete: comparisons.iter().filter(|c| c.winner.is_none()).count(),
            rows,
        }
    }
}

/// Render the Markdown report for a set of comparisons.
pub fn render_markdown(
    comparisons: &[EvalComparison],
    generated_at: DateTime<Utc>,
) -> Result<String, ReportError> {
    let context = Context::from_serialize(ReportView::new(comparisons, generated_at))?;
    Ok(Tera::one_off(REPORT_TEMPLATE, &context, false)?)
}

/// Hex characters of the raw-name hash appended to rewritten names.
const NAME_HASH_LEN: usize = 8;

/// Map a name to a safe path component.
///
/// Names made only of `[A-Za-z0-9._-]` are kept as they are. Anything else is
/// replaced by `_` and suffixed with a short hash of the raw name, so distinct
/// names never share a directory.
fn path_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized == name && !matches!(name, "" | "." | "..") {
        return sanitized;
    }

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let prefix = match sanitized.as_str() {
        "" | "." | ".." => "_",
        other => other,
    };
    format!("{}-{}", prefix, &digest[..NAME_HASH_LEN])
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.6fZ").to_string()
}

/// Reporter writing JSON results and Markdown reports below one directory.
#[derive(Debug, Clone)]
pub struct FileReporter {
    root: PathBuf,
}

impl FileReporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn results_dir(&self, fixture: &str, agent: &str) -> PathBuf {
        self.root
            .join("results")
            .join(path_component(fixture))
            .join(path_component(agent))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn baseline_path(&self, fixture: &str) -> PathBuf {
        self.root
            .join("baselines")
            .join(format!("{}.json", path_component(fixture)))
    }

    /// The most recently saved result for an agent on a fixture.
    pub async fn load_latest(
        &self,
        fixture: &str,
        agent: &str,
    ) -> Result<Option<EvalResult>, ReportError> {
        let path = self.results_dir(fixture, agent).join("latest.json");
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a comparison as the baseline for its fixture.
    pub async fn save_baseline(&self, comparison: &EvalComparison) -> Result<PathBuf, ReportError> {
        let path = self.baseline_path(&comparison.fixture);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, serde_json::to_string_pretty(comparison)?).await?;
        info!(fixture = %comparison.fixture, path = %path.display(), "Saved baseline");
        Ok(path)
    }
}

#[async_trait]
impl Reporter for FileReporter {
    async fn save_results(&self, result: &EvalResult) -> Result<(), ReportError> {
        let dir = self.results_dir(result.fixture(), result.agent());
        fs::create_dir_all(&dir).await?;

        let json = serde_json::to_string_pretty(result)?;
        let path = dir.join(format!("{}.json", timestamp(result.evaluated_at())));
        fs::write(&path, &json).await?;
        fs::write(dir.join("latest.json"), &json).await?;

        debug!(
            agent = result.agent(),
            fixture = result.fixture(),
            path = %path.display(),
            "Saved result"
        );
        Ok(())
    }

    async fn generate_report(&self, comparisons: &[EvalComparison]) -> Result<(), ReportError> {
        let dir = self.reports_dir();
        fs::create_dir_all(&dir).await?;

        let now = Utc::now();
        let stamp = timestamp(now);
        let markdown = render_markdown(comparisons, now)?;

        let report_path = dir.join(format!("report-{}.md", stamp));
        fs::write(&report_path, &markdown).await?;
        fs::write(dir.join("latest.md"), &markdown).await?;
        fs::write(
            dir.join(format!("comparisons-{}.json", stamp)),
            serde_json::to_string_pretty(comparisons)?,
        )
        .await?;

        info!(
            comparisons = comparisons.len(),
            path = %report_path.display(),
            "Report written"
        );
        Ok(())
    }

    async fn compare_with_baseline(
        &self,
        comparison: &EvalComparison,
    ) -> Result<Option<BaselineDiff>, ReportError> {
        let path = self.baseline_path(&comparison.fixture);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let baseline: EvalComparison = serde_json::from_str(&content)?;
        Ok(Some(BaselineDiff::between(&baseline, comparison)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::{comparison, result};
    use tempfile::TempDir;

    #[test]
    fn test_path_component() {
        assert_eq!(path_component("simple-case_1.v2"), "simple-case_1.v2");

        let rewritten = path_component("llm:anthropic/claude");
        assert!(rewritten.starts_with("llm_anthropic_claude-"));
        assert_eq!(rewritten.len(), "llm_anthropic_claude-".len() + NAME_HASH_LEN);
        assert_eq!(rewritten, path_component("llm:anthropic/claude"));

        let dots = path_component("..");
        assert!(dots.starts_with("_-"));
        assert!(!dots.contains('/'));
    }

    #[test]
    fn test_path_component_keeps_names_apart() {
        let names = ["cmd:a/b", "cmd:a_b", "cmd_a_b", "cmd a b"];
        let mut components: Vec<String> = names.iter().map(|n| path_component(n)).collect();
        components.sort();
        components.dedup();
        assert_eq!(components.len(), names.len());
    }

    #[tokio::test]
    async fn test_agents_with_similar_names_keep_separate_results() {
        let dir = TempDir::new().expect("tempdir");
        let reporter = FileReporter::new(dir.path());
        let first = result("cmd:a/b", "simple", 6.0);
        let second = result("cmd:a_b", "simple", 9.0);
        reporter.save_results(&first).await.expect("save");
        reporter.save_results(&second).await.expect("save");

        assert_ne!(
            reporter.results_dir("simple", "cmd:a/b"),
            reporter.results_dir("simple", "cmd:a_b")
        );
        let loaded = reporter
            .load_latest("simple", "cmd:a/b")
            .await
            .expect("load")
            .expect("present");
        assert_eq!(loaded, first);
    }

    #[test]
    fn test_render_markdown() {
        let comparisons = vec![
            comparison("simple", Some(8.5), Some(7.0)),
            comparison("rename", Some(7.0), None),
        ];
        let markdown = render_markdown(&comparisons, Utc::now()).expect("render");
        assert!(markdown.contains("| claude wins | 1 |"));
        assert!(markdown.contains("| Incomplete | 1 |"));
        assert!(markdown.contains("| simple | 8.50 (3/3) | 7.00 (3/3) | claude |"));
        assert!(markdown.contains("| rename | 7.00 (3/3) | n/a | none |"));
        assert!(markdown.contains("feat(parser): add parse_expr"));
    }

    #[tokio::test]
    async fn test_save_results_layout() {
        let dir = TempDir::new().expect("tempdir");
        let reporter = FileReporter::new(dir.path());
        let saved = result("llm:test/model", "simple", 8.0);
        reporter.save_results(&saved).await.expect("save");

        let results_dir = reporter.results_dir("simple", "llm:test/model");
        assert!(results_dir.join("latest.json").exists());
        let entries = std::fs::read_dir(&results_dir).expect("dir").count();
        assert_eq!(entries, 2);

        let loaded = reporter
            .load_latest("simple", "llm:test/model")
            .await
            .expect("load")
            .expect("present");
        assert_eq!(loaded, saved);
        assert!(reporter
            .load_latest("simple", "other")
            .await
            .expect("load")
            .is_none());
    }

    #[tokio::test]
    async fn test_generate_report_writes_files() {
        let dir = TempDir::new().expect("tempdir");
        let reporter = FileReporter::new(dir.path());
        reporter
            .generate_report(&[comparison("simple", Some(8.0), Some(8.2))])
            .await
            .expect("report");

        let latest = std::fs::read_to_string(reporter.reports_dir().join("latest.md"))
            .expect("latest report");
        assert!(latest.contains("| Ties | 1 |"));
        let names: Vec<String> = std::fs::read_dir(reporter.reports_dir())
            .expect("dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().any(|n| n.starts_with("comparisons-")));
        assert!(names.iter().any(|n| n.starts_with("report-")));
    }

    #[tokio::test]
    async fn test_baseline_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let reporter = FileReporter::new(dir.path());
        let current = comparison("simple", Some(8.0), Some(6.0));

        assert!(reporter
            .compare_with_baseline(&current)
            .await
            .expect("compare")
            .is_none());

        reporter
            .save_baseline(&comparison("simple", Some(7.0), Some(6.0)))
            .await
            .expect("save baseline");
        let diff = reporter
            .compare_with_baseline(&current)
            .await
            .expect("compare")
            .expect("baseline present");
        assert!(diff.fingerprint_matches);
        assert_eq!(diff.agent_a_delta, Some(1.0));
        assert_eq!(diff.agent_b_delta, Some(0.0));
        assert!(diff.winner_changed());
    }

    #[tokio::test]
    async fn test_corrupt_baseline_is_error() {
        let dir = TempDir::new().expect("tempdir");
        let reporter = FileReporter::new(dir.path());
        let path = reporter.baseline_path("simple");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "{not json").expect("write");

        let err = reporter
            .compare_with_baseline(&comparison("simple", Some(8.0), None))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Json(_)));
    }

    #[tokio::test]
    async fn test_baseline_with_inconsistent_winner_is_error() {
        let dir = TempDir::new().expect("tempdir");
        let reporter = FileReporter::new(dir.path());
        let path = reporter
            .save_baseline(&comparison("simple", Some(8.0), Some(6.0)))
            .await
            .expect("save baseline");

        let stored = std::fs::read_to_string(&path).expect("read baseline");
        let tampered = stored.replace("\"winner\": \"agent_a\"", "\"winner\": \"agent_b\"");
        assert_ne!(tampered, stored);
        std::fs::write(&path, tampered).expect("write");

        let err = reporter
            .compare_with_baseline(&comparison("simple", Some(8.0), Some(6.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Json(_)));
    }
}
