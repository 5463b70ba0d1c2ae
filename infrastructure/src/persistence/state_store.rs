//! Workflow state stored as `<projects_dir>/<project>/state.json`.

use super::write_json_atomic;
use async_trait::async_trait;
use gatekeeper_application::{StateStoreError, WorkflowStateStore};
use gatekeeper_domain::WorkflowState;
use std::path::{Path, PathBuf};
use tracing::debug;

const STATE_FILE: &str = "state.json";

pub struct JsonStateStore {
    projects_dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Directory holding everything recorded for one project.
    ///
    /// Project ids become directory names, so separators and `..` are
    /// rejected.
    pub fn project_dir(&self, project_id: &str) -> Result<PathBuf, StateStoreError> {
        let trimmed = project_id.trim();
        if trimmed.is_empty()
            || trimmed == "."
            || trimmed.contains("..")
            || trimmed.contains(['/', '\\'])
        {
            return Err(StateStoreError::Invalid(format!(
                "'{}' is not a valid project id",
                project_id
            )));
        }
        Ok(self.projects_dir.join(trimmed))
    }

    fn state_path(&self, project_id: &str) -> Result<PathBuf, StateStoreError> {
        Ok(self.project_dir(project_id)?.join(STATE_FILE))
    }
}

#[async_trait]
impl WorkflowStateStore for JsonStateStore {
    async fn load(&self, project_id: &str) -> Result<Option<WorkflowState>, StateStoreError> {
        let path = self.state_path(project_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateStoreError::Io(e.to_string())),
        };

        let state: WorkflowState = serde_json::from_str(&content)
            .map_err(|e| StateStoreError::Invalid(format!("{}: {}", path.display(), e)))?;
        if state.project_id != project_id.trim() {
            return Err(StateStoreError::Invalid(format!(
                "{} belongs to project '{}'",
                path.display(),
                state.project_id
            )));
        }
        Ok(Some(state))
    }

    async fn save(&self, state: &WorkflowState) -> Result<(), StateStoreError> {
        let path = self.state_path(&state.project_id)?;
        write_json_atomic(&path, state).map_err(|e| StateStoreError::Io(e.to_string()))?;
        debug!("Saved state of {} at {}", state.project_id, state.current_phase);
        Ok(())
    }
}
