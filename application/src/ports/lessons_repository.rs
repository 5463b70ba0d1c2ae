//! Lessons persistence port

use async_trait::async_trait;
use gatekeeper_domain::LessonsDocument;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Lessons document is corrupt: {0}")]
    Corrupt(String),
}

/// Load and save the single lessons document.
#[async_trait]
pub trait LessonsRepository: Send + Sync {
    /// The stored document, or an empty one when nothing is stored yet.
    async fn load(&self) -> Result<LessonsDocument, RepositoryError>;

    async fn save(&self, document: &LessonsDocument) -> Result<(), RepositoryError>;
}
