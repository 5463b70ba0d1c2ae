//! In-memory doubles for the ports, shared by the use case tests.

use crate::ports::agent_invoker::{AgentInvoker, AgentRequest, AgentResponse, InvocationError};
use crate::ports::audit_sink::{AuditSink, LedgerError};
use crate::ports::escalation::{EscalationError, EscalationHandler, EscalationRequest};
use crate::ports::lessons_repository::{LessonsRepository, RepositoryError};
use crate::ports::state_store::{StateStoreError, WorkflowStateStore};
use async_trait::async_trait;
use chrono::Utc;
use gatekeeper_domain::{
    AuditEvent, EventKind, LessonsDocument, SessionSummary, WorkflowState,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const PASS: &str =
    r#"{"vote": "approve", "confidence": 90, "reasoning": "Looks good", "concerns": [], "suggestions": []}"#;

pub fn reject(concern: &str, suggestion: &str) -> String {
    serde_json::json!({
        "vote": "reject",
        "confidence": 80,
        "reasoning": format!("Rejected: {concern}"),
        "concerns": [concern],
        "suggestions": [suggestion],
    })
    .to_string()
}

#[derive(Default)]
struct Script {
    queued: VecDeque<Result<String, InvocationError>>,
    fallback: Option<Result<String, InvocationError>>,
    delay: Option<Duration>,
    calls: Vec<AgentRequest>,
}

/// Agent invoker that replays scripted replies per agent.
///
/// Queued replies are used first; after that the fallback repeats.
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script(self, agent: &str, f: impl FnOnce(&mut Script)) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            f(scripts.entry(agent.to_string()).or_default());
        }
        self
    }

    pub fn reply(self, agent: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        self.with_script(agent, |s| s.queued.push_back(Ok(content)))
    }

    pub fn fail(self, agent: &str, error: InvocationError) -> Self {
        self.with_script(agent, |s| s.queued.push_back(Err(error)))
    }

    pub fn always(self, agent: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        self.with_script(agent, |s| s.fallback = Some(Ok(content)))
    }

    pub fn always_fail(self, agent: &str, error: InvocationError) -> Self {
        self.with_script(agent, |s| s.fallback = Some(Err(error)))
    }

    pub fn delay(self, agent: &str, delay: Duration) -> Self {
        self.with_script(agent, |s| s.delay = Some(delay))
    }

    pub fn calls(&self, agent: &str) -> Vec<AgentRequest> {
        self.scripts
            .lock()
            .unwrap()
            .get(agent)
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, InvocationError> {
        let (reply, delay) = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts
                .get_mut(&request.agent_id)
                .ok_or_else(|| InvocationError::UnknownAgent(request.agent_id.clone()))?;
            script.calls.push(request.clone());
            let reply = script
                .queued
                .pop_front()
                .or_else(|| script.fallback.clone())
                .unwrap_or_else(|| Err(InvocationError::RequestFailed("script exhausted".into())));
            (reply, script.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply.map(|content| AgentResponse {
            agent_id: request.agent_id.clone(),
            role: self.role(&request.agent_id),
            model: "claude-sonnet-4-20250514".into(),
            content,
            input_tokens: 100,
            output_tokens: 50,
        })
    }
}

/// Ledger that keeps events in memory.
pub struct MemoryLedger {
    session_id: String,
    project_id: String,
    state: Mutex<(Vec<AuditEvent>, SessionSummary)>,
    failing: AtomicBool,
}

impl MemoryLedger {
    pub fn new(session_id: &str, project_id: &str) -> Self {
        Self {
            session_id: session_id.into(),
            project_id: project_id.into(),
            state: Mutex::new((
                Vec::new(),
                SessionSummary::new(session_id, project_id, Utc::now()),
            )),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.state.lock().unwrap().0.clone()
    }

    pub fn events_of(&self, kind: EventKind) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }
}

impl AuditSink for MemoryLedger {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn project_id(&self) -> &str {
        &self.project_id
    }

    fn append(&self, event: AuditEvent) -> Result<(), LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Write {
                attempts: 3,
                message: "disk full".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.1.apply(&event);
        state.0.push(event);
        Ok(())
    }

    fn summary(&self) -> SessionSummary {
        self.state.lock().unwrap().1.clone()
    }

    fn finalize(&self) -> Result<SessionSummary, LedgerError> {
        self.append(AuditEvent::new(
            EventKind::SessionEnd,
            &self.session_id,
            &self.project_id,
            Utc::now(),
        ))?;
        Ok(self.summary())
    }
}

#[derive(Default)]
pub struct MemoryLessons {
    pub document: Mutex<Option<LessonsDocument>>,
    pub saves: Mutex<u32>,
    failing: AtomicBool,
}

impl MemoryLessons {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl LessonsRepository for MemoryLessons {
    async fn load(&self) -> Result<LessonsDocument, RepositoryError> {
        Ok(self
            .document
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| LessonsDocument::empty(Utc::now())))
    }

    async fn save(&self, document: &LessonsDocument) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Io("disk full".into()));
        }
        *self.document.lock().unwrap() = Some(document.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    pub states: Mutex<HashMap<String, WorkflowState>>,
}

#[async_trait]
impl WorkflowStateStore for MemoryStateStore {
    async fn load(&self, project_id: &str) -> Result<Option<WorkflowState>, StateStoreError> {
        Ok(self.states.lock().unwrap().get(project_id).cloned())
    }

    async fn save(&self, state: &WorkflowState) -> Result<(), StateStoreError> {
        self.states
            .lock()
            .unwrap()
            .insert(state.project_id.clone(), state.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEscalation {
    pub requests: Mutex<Vec<EscalationRequest>>,
}

#[async_trait]
impl EscalationHandler for RecordingEscalation {
    async fn escalate(&self, request: &EscalationRequest) -> Result<(), EscalationError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}
