//! Per-project session index and ledger readers.
//!
//! Layout under a project directory:
//!
//! ```text
//! <project_dir>/audit/
//!     index.json                      sessions, newest first
//!     session_2025-01-15_143022.jsonl one event per line
//! ```

use crate::persistence::write_json_atomic;
use chrono::{DateTime, Utc};
use gatekeeper_domain::{AuditEvent, SessionSummary};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const AUDIT_DIR: &str = "audit";
pub const INDEX_FILE: &str = "index.json";

const SESSION_PREFIX: &str = "session_";
const SESSION_SUFFIX: &str = ".jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionIndexEntry {
    pub session_id: String,
    pub project_id: String,
    pub started_at: DateTime<Utc>,
    /// Ledger file name, relative to the audit directory.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_calls: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl SessionIndexEntry {
    pub fn started(session_id: &str, project_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            project_id: project_id.to_string(),
            started_at,
            file: session_file_name(session_id),
            ended_at: None,
            event_count: None,
            agent_calls: None,
            total_cost_usd: None,
            total_tokens: None,
        }
    }

    /// Copy the final statistics of a finished session.
    pub fn finish(&mut self, summary: &SessionSummary) {
        self.ended_at = summary.ended_at;
        self.event_count = Some(summary.event_count);
        self.agent_calls = Some(summary.agent_calls);
        self.total_cost_usd = Some((summary.total_cost_usd * 10_000.0).round() / 10_000.0);
        self.total_tokens = Some(summary.total_tokens());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionIndex {
    #[serde(default)]
    pub sessions: Vec<SessionIndexEntry>,
}

impl SessionIndex {
    /// Read the index of an audit directory.
    ///
    /// A missing or unreadable index is treated as empty.
    pub fn read(audit_dir: &Path) -> Self {
        let path = audit_dir.join(INDEX_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Could not read session index {}: {}", path.display(), e);
                }
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Session index {} is corrupt, rebuilding: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn write(&self, audit_dir: &Path) -> io::Result<()> {
        write_json_atomic(&audit_dir.join(INDEX_FILE), self)
    }

    /// Insert or replace an entry and restore newest-first order.
    pub fn upsert(&mut self, entry: SessionIndexEntry) {
        self.sessions.retain(|s| s.session_id != entry.session_id);
        self.sessions.push(entry);
        self.sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut SessionIndexEntry> {
        self.sessions.iter_mut().find(|s| s.session_id == session_id)
    }
}

pub fn audit_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(AUDIT_DIR)
}

pub fn session_file_name(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}{SESSION_SUFFIX}")
}

pub fn session_path(project_dir: &Path, session_id: &str) -> PathBuf {
    audit_dir(project_dir).join(session_file_name(session_id))
}

/// Most recent session of a project.
///
/// The index is consulted first. When it is missing, corrupt, empty or
/// points at a file that no longer exists, the audit directory is scanned
/// for `session_*.jsonl` files instead.
pub fn latest_session(project_dir: &Path) -> Option<String> {
    let dir = audit_dir(project_dir);

    let index = SessionIndex::read(&dir);
    if let Some(entry) = index.sessions.first() {
        if dir.join(&entry.file).is_file() {
            return Some(entry.session_id.clone());
        }
        debug!("Index points at missing {}, scanning", entry.file);
    }

    scan_sessions(&dir).into_iter().next()
}

/// Session ids found on disk, newest first.
///
/// Session ids start with a sortable timestamp, so name order is time order.
fn scan_sessions(audit_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(audit_dir) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_prefix(SESSION_PREFIX)
                .and_then(|rest| rest.strip_suffix(SESSION_SUFFIX))
                .map(str::to_string)
        })
        .collect();
    ids.sort_by(|a, b| b.cmp(a));
    ids
}

/// All readable events of one session, in file order.
///
/// Blank and malformed lines are skipped. A ledger that is still being
/// written may end in a partial line, and readers must not fail on it.
pub fn read_session_events(project_dir: &Path, session_id: &str) -> Vec<AuditEvent> {
    let path = session_path(project_dir, session_id);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not read ledger {}: {}", path.display(), e);
            }
            return Vec::new();
        }
    };

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<AuditEvent>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("Skipping malformed ledger line in {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}
