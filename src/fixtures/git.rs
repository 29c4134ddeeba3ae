//! A single fixture captured from the staged changes of a live repository.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Fixture, FixtureSource};
use crate::error::FixtureError;

/// Captures `git diff --cached` and `git status --porcelain` as one fixture.
///
/// Falls back to the unstaged diff against `HEAD` when nothing is staged.
#[derive(Debug, Clone)]
pub struct GitFixtureSource {
    repo: PathBuf,
    name: String,
    description: String,
    expected_type: String,
}

impl GitFixtureSource {
    pub fn new(repo: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            name: name.into(),
            description: String::new(),
            expected_type: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expected_type(mut self, expected_type: impl Into<String>) -> Self {
        self.expected_type = expected_type.into();
        self
    }

    async fn git(&self, args: &[&str]) -> Result<String, FixtureError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| FixtureError::Repository(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(FixtureError::Repository(format!(
                "git {} failed in {}: {}",
                args.join(" "),
                self.repo.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl FixtureSource for GitFixtureSource {
    async fn list(&self) -> Result<Vec<String>, FixtureError> {
        Ok(vec![self.name.clone()])
    }

    async fn load(&self, name: &str) -> Result<Fixture, FixtureError> {
        if name != self.name {
            return Err(FixtureError::Missing(name.to_string()));
        }

        let mut diff = self.git(&["diff", "--cached", "--no-color"]).await?;
        if diff.trim().is_empty() {
            tracing::debug!(repo = %self.repo.display(), "Nothing staged, using working tree diff");
            diff = self.git(&["diff", "HEAD", "--no-color"]).await?;
        }
        let status = self.git(&["status", "--porcelain"]).await?;

        let fixture = Fixture {
            name: self.name.clone(),
            diff,
            status,
            description: self.description.clone(),
            expected_type: self.expected_type.clone(),
        };
        fixture.validate()?;
        Ok(fixture)
    }
}
