//! Fixtures stored as one directory each.
//!
//! ```text
//! fixtures/
//!   simple/
//!     fixture.yaml   # description, expected_type, optional name
//!     diff.patch
//!     status.txt     # optional
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use walkdir::WalkDir;

use super::{Fixture, FixtureSource};
use crate::error::FixtureError;

/// Metadata file inside each fixture directory.
pub const METADATA_FILE: &str = "fixture.yaml";
/// Staged diff inside each fixture directory.
pub const DIFF_FILE: &str = "diff.patch";
/// `git status` output inside each fixture directory.
pub const STATUS_FILE: &str = "status.txt";

#[derive(Debug, Default, Deserialize)]
struct FixtureMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "expectedType")]
    expected_type: String,
}

/// Loads fixtures from a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryFixtures {
    root: PathBuf,
}

impl DirectoryFixtures {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fixture_dir(&self, name: &str) -> Result<PathBuf, FixtureError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(FixtureError::Invalid {
                name: name.to_string(),
                reason: "name must be a single path component".to_string(),
            });
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FixtureSource for DirectoryFixtures {
    async fn list(&self) -> Result<Vec<String>, FixtureError> {
        if !self.root.is_dir() {
            return Err(FixtureError::Missing(self.root.display().to_string()));
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| FixtureError::Io(e.into()))?;
            if entry.file_type().is_dir() && entry.path().join(METADATA_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        tracing::debug!(root = %self.root.display(), count = names.len(), "Discovered fixtures");
        Ok(names)
    }

    async fn load(&self, name: &str) -> Result<Fixture, FixtureError> {
        let dir = self.fixture_dir(name)?;
        let metadata_path = dir.join(METADATA_FILE);
        if !metadata_path.is_file() {
            return Err(FixtureError::Missing(name.to_string()));
        }

        let metadata_text = tokio::fs::read_to_string(&metadata_path).await?;
        let metadata: FixtureMetadata = if metadata_text.trim().is_empty() {
            FixtureMetadata::default()
        } else {
            serde_yaml::from_str(&metadata_text)?
        };

        let diff = match tokio::fs::read_to_string(dir.join(DIFF_FILE)).await {
            Ok(diff) => diff,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FixtureError::Invalid {
                    name: name.to_string(),
                    reason: format!("{} is missing", DIFF_FILE),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let status = match tokio::fs::read_to_string(dir.join(STATUS_FILE)).await {
            Ok(status) => status,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let fixture = Fixture {
            name: metadata.name.unwrap_or_else(|| name.to_string()),
            diff,
            status,
            description: metadata.description,
            expected_type: metadata.expected_type,
        };
        fixture.validate()?;

        tracing::debug!(fixture = %fixture.name, dir = %dir.display(), "Loaded fixture");
        Ok(fixture)
    }
}
