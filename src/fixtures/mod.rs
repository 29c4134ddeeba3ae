//! Evaluation fixtures and the sources they are loaded from.
//!
//! A [`Fixture`] is one repeatable scenario: a staged diff, the matching
//! `git status` output, a description and the commit type a good message
//! should use. Sources implement [`FixtureSource`]:
//!
//! - [`DirectoryFixtures`]: one directory per fixture on disk
//! - [`StaticFixtures`]: in-memory fixtures for tests and embedding
//! - [`GitFixtureSource`]: the staged changes of a live repository

pub mod directory;
pub mod git;

pub use directory::DirectoryFixtures;
pub use git::GitFixtureSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FixtureError;

/// One evaluation scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub name: String,
    pub diff: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub description: String,
    /// Conventional commit type a good message uses, e.g. `feat`.
    #[serde(default)]
    pub expected_type: String,
}

impl Fixture {
    pub fn new(name: impl Into<String>, diff: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diff: diff.into(),
            status: String::new(),
            description: String::new(),
            expected_type: String::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_expected_type(mut self, expected_type: impl Into<String>) -> Self {
        self.expected_type = expected_type.into();
        self
    }

    /// Check the fields every evaluation needs.
    pub fn validate(&self) -> Result<(), FixtureError> {
        if self.name.trim().is_empty() {
            return Err(FixtureError::Invalid {
                name: self.name.clone(),
                reason: "name is empty".to_string(),
            });
        }
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(FixtureError::Invalid {
                name: self.name.clone(),
                reason: "name must be a single path component".to_string(),
            });
        }
        if self.diff.trim().is_empty() {
            return Err(FixtureError::Invalid {
                name: self.name.clone(),
                reason: "diff is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Hex SHA-256 over diff and status.
    ///
    /// Baselines are only comparable when fingerprints match.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.diff.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.status.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Where fixtures come from.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    /// Names of all available fixtures, sorted.
    async fn list(&self) -> Result<Vec<String>, FixtureError>;

    /// Load one fixture; [`FixtureError::Missing`] if it does not exist.
    async fn load(&self, name: &str) -> Result<Fixture, FixtureError>;
}

/// Fixtures held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticFixtures {
    fixtures: Vec<Fixture>,
}

impl StaticFixtures {
    pub fn new(fixtures: Vec<Fixture>) -> Self {
        Self { fixtures }
    }

    pub fn push(&mut self, fixture: Fixture) {
        self.fixtures.push(fixture);
    }
}

#[async_trait]
impl FixtureSource for StaticFixtures {
    async fn list(&self) -> Result<Vec<String>, FixtureError> {
        let mut names: Vec<String> = self.fixtures.iter().map(|f| f.name.clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn load(&self, name: &str) -> Result<Fixture, FixtureError> {
        self.fixtures
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .ok_or_else(|| FixtureError::Missing(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Fixture {
        Fixture::new("simple", "+fn main() {}\n")
            .with_status("M  src/main.rs")
            .with_description("Add an entry point")
            .with_expected_type("feat")
    }

    #[test]
    fn test_validate_accepts_complete_fixture() {
        assert!(fixture().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        assert!(matches!(
            Fixture::new("", "+x").validate(),
            Err(FixtureError::Invalid { .. })
        ));
        assert!(matches!(
            Fixture::new("empty", "  \n").validate(),
            Err(FixtureError::Invalid { reason, .. }) if reason.contains("diff")
        ));
        assert!(Fixture::new("../escape", "+x").validate().is_err());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = fixture();
        let mut b = fixture();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        b.diff.push_str("+// changed\n");
        assert_ne!(a.fingerprint(), b.fingerprint());

        let renamed = Fixture {
            name: "other".to_string(),
            ..fixture()
        };
        assert_eq!(a.fingerprint(), renamed.fingerprint());
    }

    #[tokio::test]
    async fn test_static_fixtures() {
        let source = StaticFixtures::new(vec![
            fixture(),
            Fixture::new("another", "+y"),
        ]);
        assert_eq!(
            source.list().await.expect("list"),
            vec!["another".to_string(), "simple".to_string()]
        );
        assert_eq!(source.load("simple").await.expect("load"), fixture());
        assert!(matches!(
            source.load("nope").await,
            Err(FixtureError::Missing(name)) if name == "nope"
        ));
    }
}
