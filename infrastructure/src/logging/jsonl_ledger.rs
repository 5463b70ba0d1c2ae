//! JSONL file writer for the decision ledger.
//!
//! Each [`AuditEvent`] is serialized as a single JSON line and appended to
//! `<project_dir>/audit/session_<id>.jsonl` through a buffered writer that
//! is flushed after every line. A line whose flush keeps failing is dropped
//! from the buffer, so it never reaches disk behind the caller's back.

use super::session_index::{SessionIndex, SessionIndexEntry, audit_dir, session_path};
use chrono::Utc;
use gatekeeper_application::{AuditSink, LedgerError};
use gatekeeper_domain::{AuditEvent, EventKind, SessionSummary};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Attempts per line before a write failure is surfaced.
pub const WRITE_ATTEMPTS: u32 = 3;

type LedgerWriter = BufWriter<Box<dyn Write + Send>>;

struct LedgerInner {
    writer: LedgerWriter,
    summary: SessionSummary,
    finalized: bool,
    /// A dropped line may have left a partial fragment on disk; the next
    /// line starts on a fresh one.
    torn: bool,
}

/// Append-only session ledger.
///
/// The line write, the flush and the summary update happen under one lock,
/// so the running summary always matches what is on disk. Flushes on `Drop`.
pub struct JsonlLedger {
    session_id: String,
    project_id: String,
    project_dir: PathBuf,
    path: PathBuf,
    inner: Mutex<LedgerInner>,
}

impl JsonlLedger {
    /// Open a new session for a project.
    ///
    /// Creates the audit directory, registers the session in the index and
    /// writes the `session_start` event.
    pub fn open(project_dir: impl AsRef<Path>, project_id: &str) -> Result<Self, LedgerError> {
        let project_dir = project_dir.as_ref();
        let dir = audit_dir(project_dir);
        std::fs::create_dir_all(&dir).map_err(|e| LedgerError::Write {
            attempts: 1,
            message: format!("create {}: {}", dir.display(), e),
        })?;

        let session_id = Self::unused_session_id(project_dir);
        let path = session_path(project_dir, &session_id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LedgerError::Write {
                attempts: 1,
                message: format!("open {}: {}", path.display(), e),
            })?;

        let started_at = Utc::now();
        let ledger = Self {
            session_id: session_id.clone(),
            project_id: project_id.to_string(),
            project_dir: project_dir.to_path_buf(),
            path,
            inner: Mutex::new(LedgerInner {
                writer: BufWriter::new(Box::new(file)),
                summary: SessionSummary::new(&session_id, project_id, started_at),
                finalized: false,
                torn: false,
            }),
        };

        let mut index = SessionIndex::read(&dir);
        index.upsert(SessionIndexEntry::started(&session_id, project_id, started_at));
        index
            .write(&dir)
            .map_err(|e| LedgerError::Index(e.to_string()))?;

        ledger.append(
            AuditEvent::new(EventKind::SessionStart, &session_id, project_id, started_at)
                .with_metadata(serde_json::json!({ "message": "Audit session started" })),
        )?;
        debug!("Opened ledger {}", ledger.path.display());
        Ok(ledger)
    }

    /// Path to the session's JSONL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamp-based id, suffixed when a session with the same second
    /// already exists.
    fn unused_session_id(project_dir: &Path) -> String {
        let base = Utc::now().format("%Y-%m-%d_%H%M%S").to_string();
        if !session_path(project_dir, &base).exists() {
            return base;
        }
        (2u32..)
            .map(|n| format!("{base}_{n}"))
            .find(|id| !session_path(project_dir, id).exists())
            .unwrap_or(base)
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Swap in a fresh buffer over the same file, dropping unwritten bytes.
fn reset_buffer(writer: &mut LedgerWriter, capacity: usize) {
    let stale = std::mem::replace(writer, BufWriter::new(Box::new(io::sink())));
    let (file, _unwritten) = stale.into_parts();
    *writer = BufWriter::with_capacity(capacity, file);
}

/// Buffer `line` once, then retry only the flush. The buffer keeps what a
/// failed flush did not write, so a retry never duplicates bytes.
fn write_line(inner: &mut LedgerInner, line: &[u8]) -> Result<(), LedgerError> {
    // Room for the line and a separator keeps buffering off the file.
    let needed = line.len() + 2;
    if inner.writer.capacity() < needed {
        reset_buffer(&mut inner.writer, needed);
    }
    let separator: &[u8] = if inner.torn { b"\n" } else { b"" };
    let buffered = inner
        .writer
        .write_all(separator)
        .and_then(|_| inner.writer.write_all(line));

    let result = match buffered {
        Ok(()) => flush_with_retry(&mut inner.writer),
        Err(e) => Err((1, e.to_string())),
    };
    match result {
        Ok(()) => {
            inner.torn = false;
            Ok(())
        }
        Err((attempts, message)) => {
            let capacity = inner.writer.capacity();
            reset_buffer(&mut inner.writer, capacity);
            inner.torn = true;
            Err(LedgerError::Write { attempts, message })
        }
    }
}

fn flush_with_retry(writer: &mut LedgerWriter) -> Result<(), (u32, String)> {
    let mut last_error = String::new();
    for attempt in 1..=WRITE_ATTEMPTS {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!("Ledger write attempt {}/{} failed: {}", attempt, WRITE_ATTEMPTS, e);
                last_error = e.to_string();
            }
        }
    }
    Err((WRITE_ATTEMPTS, last_error))
}

/// Write one event and fold it into the summary. The caller holds the lock.
fn append_locked(inner: &mut LedgerInner, event: &AuditEvent) -> Result<(), LedgerError> {
    let mut line = serde_json::to_vec(event).map_err(|e| LedgerError::Encode(e.to_string()))?;
    line.push(b'\n');
    write_line(inner, &line)?;
    inner.summary.apply(event);
    Ok(())
}

impl AuditSink for JsonlLedger {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn project_id(&self) -> &str {
        &self.project_id
    }

    fn append(&self, event: AuditEvent) -> Result<(), LedgerError> {
        append_locked(&mut self.lock(), &event)
    }

    fn summary(&self) -> SessionSummary {
        self.lock().summary.clone()
    }

    fn finalize(&self) -> Result<SessionSummary, LedgerError> {
        let summary = {
            let mut inner = self.lock();
            if inner.finalized {
                return Ok(inner.summary.clone());
            }
            let end = AuditEvent::new(
                EventKind::SessionEnd,
                &self.session_id,
                &self.project_id,
                Utc::now(),
            );
            append_locked(&mut inner, &end)?;
            inner.finalized = true;
            inner.summary.clone()
        };

        let dir = audit_dir(&self.project_dir);
        let mut index = SessionIndex::read(&dir);
        match index.get_mut(&self.session_id) {
            Some(entry) => entry.finish(&summary),
            None => {
                let mut entry =
                    SessionIndexEntry::started(&self.session_id, &self.project_id, summary.started_at);
                entry.finish(&summary);
                index.upsert(entry);
            }
        }
        index
            .write(&dir)
            .map_err(|e| LedgerError::Index(e.to_string()))?;
        Ok(summary)
    }
}

impl Drop for JsonlLedger {
    fn drop(&mut self) {
        let _ = self.lock().writer.flush();
    }
}
