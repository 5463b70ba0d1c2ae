//! Console escalation handler.
//!
//! When a gate exhausts its revisions the workflow stops at `escalated`
//! and the operator sees:
//!
//! ```text
//! ============================================================
//! ESCALATION code_review at Code Review
//! ============================================================
//! Project: wishlist
//! Attempts: 4
//! Reason: Gate code_review failed after 4 attempts
//!
//! Reviewer feedback
//! ----------------------------------------
//!   <aggregated feedback of the last attempt>
//!
//! After review, continue with: gatekeeper resume wishlist
//! ```
//!
//! The handler does not wait for input; the saved state is the hand-off.

use crate::output::console::ConsoleFormatter;
use async_trait::async_trait;
use gatekeeper_application::{EscalationError, EscalationHandler, EscalationRequest};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Prints an escalation panel to a terminal stream (stderr by default).
pub struct ConsoleEscalation {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleEscalation {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stderr()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for ConsoleEscalation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscalationHandler for ConsoleEscalation {
    async fn escalate(&self, request: &EscalationRequest) -> Result<(), EscalationError> {
        let panel = ConsoleFormatter::escalation(request);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(panel.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| EscalationError::Delivery(e.to_string()))
    }
}
