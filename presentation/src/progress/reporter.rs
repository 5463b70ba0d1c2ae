//! Progress reporting for workflow execution

use colored::Colorize;
use gatekeeper_application::{EscalationRequest, WorkflowProgressNotifier};
use gatekeeper_domain::{Abstention, GateResult, StepReport, StepStatus, Vote, WorkflowPhase};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(120);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn vote_line(vote: &Vote) -> String {
    let mark = if vote.is_pass() {
        "v".green()
    } else {
        "x".red()
    };
    let recovered = if vote.is_recovered() { " (recovered)" } else { "" };
    format!(
        "{} {} [{}] {} {}%{}",
        mark,
        vote.voter_id,
        vote.role,
        vote.verdict.as_str().to_uppercase(),
        vote.confidence,
        recovered
    )
}

fn abstention_line(abstention: &Abstention) -> String {
    format!(
        "{} {} abstained: {}",
        "-".yellow(),
        abstention.voter_id,
        abstention.reason.label()
    )
}

fn gate_line(result: &GateResult) -> String {
    let verdict = if result.passed {
        "PASSED".green().bold()
    } else {
        "REJECTED".red().bold()
    };
    format!(
        "{} {} {} {}/{} pass (need {}), {} abstained",
        result.gate_name.bold(),
        result.vote_summary(),
        verdict,
        result.approve_count,
        result.votes.len(),
        result.threshold,
        result.abstain_count()
    )
}

fn step_line(report: &StepReport) -> String {
    let status = match report.status {
        StepStatus::Approved => report.status.as_str().green(),
        StepStatus::Escalated => report.status.as_str().yellow(),
        StepStatus::Failed | StepStatus::Cancelled => report.status.as_str().red(),
    };
    let score = report
        .score
        .map(|s| format!(" score {s}"))
        .unwrap_or_default();
    format!(
        "{} {}{}, {} finding(s)",
        report.step.bold(),
        status,
        score,
        report.findings.len()
    )
}

fn escalation_line(request: &EscalationRequest) -> String {
    format!(
        "{} {} escalated at {} after {} attempt(s)",
        "!".red().bold(),
        request.gate_id,
        request.phase,
        request.attempts
    )
}

/// Reports progress with indicatif spinners
pub struct ProgressReporter {
    multi: MultiProgress,
    phase_bar: Mutex<Option<ProgressBar>>,
    step_bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            phase_bar: Mutex::new(None),
            step_bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn step_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("  {spinner:.blue} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn spinner(&self, style: ProgressStyle, prefix: String, message: &'static str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(style);
        pb.set_prefix(prefix);
        pb.set_message(message);
        pb.enable_steady_tick(TICK);
        pb
    }

    fn set_phase_message(&self, message: String) {
        if let Some(pb) = lock(&self.phase_bar).as_ref() {
            pb.set_message(message);
        }
    }

    fn println(&self, line: String) {
        // Printing above the bars only fails when the terminal is gone.
        let _ = self.multi.println(format!("  {line}"));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowProgressNotifier for ProgressReporter {
    fn on_phase_start(&self, phase: WorkflowPhase) {
        let pb = self.spinner(
            Self::spinner_style(),
            phase.display_name().to_string(),
            "Starting...",
        );
        if let Some(previous) = lock(&self.phase_bar).replace(pb) {
            previous.finish_and_clear();
        }
    }

    fn on_phase_complete(&self, phase: WorkflowPhase, success: bool) {
        if let Some(pb) = lock(&self.phase_bar).take() {
            let status = if success {
                "done".green()
            } else {
                "not passed".red()
            };
            pb.finish_with_message(format!("{} {}", phase.as_str(), status));
        }
    }

    fn on_gate_attempt(&self, gate_id: &str, attempt: u32, max_attempts: u32) {
        self.set_phase_message(format!(
            "{gate_id}: collecting votes (attempt {attempt}/{max_attempts})"
        ));
    }

    fn on_vote_cast(&self, _gate_id: &str, vote: &Vote) {
        self.println(vote_line(vote));
    }

    fn on_abstention(&self, _gate_id: &str, abstention: &Abstention) {
        self.println(abstention_line(abstention));
    }

    fn on_gate_result(&self, result: &GateResult) {
        self.println(gate_line(result));
        if !result.passed {
            self.set_phase_message(format!("{}: revising", result.gate_id));
        }
    }

    fn on_escalation(&self, request: &EscalationRequest) {
        self.println(escalation_line(request));
    }

    fn on_step_start(&self, step: &str) {
        let pb = self.spinner(Self::step_style(), step.to_string(), "assessing...");
        lock(&self.step_bars).insert(step.to_string(), pb);
    }

    fn on_step_complete(&self, report: &StepReport) {
        match lock(&self.step_bars).remove(&report.step) {
            Some(pb) => pb.finish_with_message(step_line(report)),
            None => self.println(step_line(report)),
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl WorkflowProgressNotifier for SimpleProgress {
    fn on_phase_start(&self, phase: WorkflowPhase) {
        println!("{} {}", "->".cyan(), phase.display_name().bold());
    }

    fn on_phase_complete(&self, _phase: WorkflowPhase, success: bool) {
        if !success {
            println!("  {}", "phase did not pass".red());
        }
        println!();
    }

    fn on_gate_attempt(&self, gate_id: &str, attempt: u32, max_attempts: u32) {
        println!("  {} {gate_id} attempt {attempt}/{max_attempts}", "*".cyan());
    }

    fn on_vote_cast(&self, _gate_id: &str, vote: &Vote) {
        println!("    {}", vote_line(vote));
    }

    fn on_abstention(&self, _gate_id: &str, abstention: &Abstention) {
        println!("    {}", abstention_line(abstention));
    }

    fn on_gate_result(&self, result: &GateResult) {
        println!("  {}", gate_line(result));
    }

    fn on_escalation(&self, request: &EscalationRequest) {
        println!("  {}", escalation_line(request));
    }

    fn on_step_start(&self, step: &str) {
        println!("  {} {}", "*".cyan(), step);
    }

    fn on_step_complete(&self, report: &StepReport) {
        println!("  {}", step_line(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gatekeeper_domain::{AbstainReason, Ballot, GateConfig, QuorumRule};

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_vote_line_shows_verdict_and_confidence() {
        plain();
        let vote = Vote::fail("security", "Security Reviewer").with_confidence(82);
        assert_eq!(vote_line(&vote), "x security [Security Reviewer] FAIL 82%");

        let recovered = Vote::pass("qa", "QA").recovered(vec!["verdict".into()]);
        assert!(vote_line(&recovered).ends_with("(recovered)"));
    }

    #[test]
    fn test_abstention_line_uses_reason_label() {
        plain();
        let abstention = Abstention::new(
            "architect",
            "Architect",
            AbstainReason::Timeout { after_secs: 300 },
        );
        assert_eq!(abstention_line(&abstention), "- architect abstained: timeout");
    }

    #[test]
    fn test_gate_line_counts() {
        plain();
        let gate = GateConfig::quorum(
            "code_review",
            "Code Review",
            vec!["a".into(), "b".into(), "c".into()],
            QuorumRule::Majority,
        );
        let ballots = vec![
            Ballot::Cast(Vote::pass("a", "A")),
            Ballot::Cast(Vote::fail("b", "B")),
            Ballot::Abstained(Abstention::new(
                "c",
                "C",
                AbstainReason::Invocation {
                    error: "boom".into(),
                },
            )),
        ];
        let result = GateResult::tally(&gate, 0, ballots, Utc::now());
        let line = gate_line(&result);
        assert!(line.starts_with("Code Review [●○·] REJECTED"));
        assert!(line.contains("1/2 pass (need 2), 1 abstained"));
    }

    #[test]
    fn test_step_line_includes_score() {
        plain();
        let report = StepReport {
            step: "security".into(),
            status: StepStatus::Approved,
            score: Some(7),
            summary: String::new(),
            findings: Vec::new(),
            attempts: 1,
        };
        assert_eq!(step_line(&report), "security approved score 7, 0 finding(s)");
    }

    #[test]
    fn test_reporters_tolerate_out_of_order_callbacks() {
        let reporter = ProgressReporter::new();
        reporter.on_phase_complete(WorkflowPhase::Ideation, true);
        reporter.on_step_complete(&StepReport {
            step: "testing".into(),
            status: StepStatus::Failed,
            score: None,
            summary: String::new(),
            findings: Vec::new(),
            attempts: 0,
        });
        reporter.on_phase_start(WorkflowPhase::Ideation);
        reporter.on_phase_start(WorkflowPhase::Prioritization);
        reporter.on_phase_complete(WorkflowPhase::Prioritization, false);
        assert!(lock(&reporter.phase_bar).is_none());
    }
}
