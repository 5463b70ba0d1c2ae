//! Workflow state persistence port

use async_trait::async_trait;
use gatekeeper_domain::WorkflowState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid workflow state: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait WorkflowStateStore: Send + Sync {
    async fn load(&self, project_id: &str) -> Result<Option<WorkflowState>, StateStoreError>;

    async fn save(&self, state: &WorkflowState) -> Result<(), StateStoreError>;
}
