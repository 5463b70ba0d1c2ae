//! Lessons document stored as a single JSON file.

use super::write_json_atomic;
use async_trait::async_trait;
use chrono::Utc;
use gatekeeper_application::{LessonsRepository, RepositoryError};
use gatekeeper_domain::LessonsDocument;
use std::path::{Path, PathBuf};
use tracing::debug;

/// [`LessonsRepository`] backed by one JSON document on disk.
///
/// A missing file loads as an empty document. A file that exists but does
/// not parse is reported as [`RepositoryError::Corrupt`] rather than being
/// silently replaced, so learned lessons are never overwritten by accident.
pub struct JsonLessonsRepository {
    path: PathBuf,
}

impl JsonLessonsRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.gatekeeper/lessons.json`, or `./.gatekeeper/lessons.json` when
    /// there is no home directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gatekeeper")
            .join("lessons.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LessonsRepository for JsonLessonsRepository {
    async fn load(&self) -> Result<LessonsDocument, RepositoryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No lessons file at {}, starting empty", self.path.display());
                return Ok(LessonsDocument::empty(Utc::now()));
            }
            Err(e) => return Err(RepositoryError::Io(e.to_string())),
        };

        if content.trim().is_empty() {
            return Ok(LessonsDocument::empty(Utc::now()));
        }

        serde_json::from_str(&content).map_err(|e| {
            RepositoryError::Corrupt(format!("{}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, document: &LessonsDocument) -> Result<(), RepositoryError> {
        write_json_atomic(&self.path, document).map_err(|e| RepositoryError::Io(e.to_string()))?;
        debug!(
            "Saved {} lessons and {} rules to {}",
            document.metadata.total_lessons,
            document.metadata.total_rules,
            self.path.display()
        );
        Ok(())
    }
}
