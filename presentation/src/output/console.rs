//! Console output formatter for workflow outcomes, status and lessons

use super::status::StatusView;
use colored::Colorize;
use gatekeeper_application::{EscalationRequest, PhaseOutcome};
use gatekeeper_domain::{Lesson, LessonsStats, Rule, TerminalKind, WorkflowPhase, WorkflowState};

/// Formats workflow results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Final report after `start`, `ingest` or `resume` stops.
    pub fn outcome(state: &WorkflowState, outcome: &PhaseOutcome) -> String {
        let mut output = String::new();
        output.push_str(&Self::header(&format!("Gatekeeper: {}", state.project_id)));
        output.push('\n');

        let (label, detail) = match outcome {
            PhaseOutcome::Finished(TerminalKind::Complete) => (
                "Complete".green().bold(),
                "All phases passed their gates.".to_string(),
            ),
            PhaseOutcome::Finished(kind) => (
                format!("{kind:?}").yellow().bold(),
                "The workflow had already stopped.".to_string(),
            ),
            PhaseOutcome::Escalated { phase, gate_id } => (
                "Escalated".red().bold(),
                format!("Gate {gate_id} at {phase} needs human review."),
            ),
            PhaseOutcome::Failed { phase, reason } => {
                ("Failed".red().bold(), format!("{phase}: {reason}"))
            }
            PhaseOutcome::Cancelled { phase } => (
                "Cancelled".yellow().bold(),
                format!("Stopped before {phase} finished; progress is saved."),
            ),
            PhaseOutcome::Advanced { from, to } => {
                ("Advanced".cyan().bold(), format!("{from} -> {to}"))
            }
            PhaseOutcome::Stalled { phase, reason } => {
                ("Stalled".yellow().bold(), format!("{phase}: {reason}"))
            }
        };
        output.push_str(&format!("{} {}\n", "Outcome:".cyan().bold(), label));
        output.push_str(&format!("  {}\n\n", detail));
        output.push_str(&format!(
            "{} {}\n",
            "Phase:".cyan().bold(),
            state.current_phase.display_name()
        ));

        if !state.artifacts.is_empty() {
            output.push_str(&Self::section_header("Artifacts"));
            for (phase, content) in &state.artifacts {
                output.push_str(&format!(
                    "  {:<28} {} bytes\n",
                    phase.display_name(),
                    content.len()
                ));
            }
        }

        if !state.gate_results.is_empty() {
            output.push_str(&Self::section_header("Gates"));
            for result in &state.gate_results {
                let verdict = if result.passed {
                    "pass".green()
                } else {
                    "fail".red()
                };
                output.push_str(&format!(
                    "  {:<28} {} {} (attempt {})\n",
                    result.gate_name,
                    result.vote_summary(),
                    verdict,
                    result.retry_count + 1
                ));
            }
        }

        if let PhaseOutcome::Escalated { .. } | PhaseOutcome::Cancelled { .. } = outcome {
            output.push_str(&format!(
                "\n{} gatekeeper resume {}\n",
                "Continue with:".dimmed(),
                state.project_id
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Ingest assessment report, when the workflow produced one.
    pub fn assessment(state: &WorkflowState) -> Option<String> {
        let report = state.artifact(WorkflowPhase::IngestAssessment)?;
        Some(format!(
            "{}{}\n",
            Self::section_header("Assessment Report"),
            report.trim_end()
        ))
    }

    pub fn status(view: &StatusView) -> String {
        let mut output = String::new();
        output.push_str(&Self::header(&format!("Status: {}", view.project_id)));
        output.push('\n');

        match view.phase {
            Some(phase) => {
                output.push_str(&format!(
                    "{} {} ({})\n",
                    "Phase:".cyan().bold(),
                    phase.display_name(),
                    view.mode.as_deref().unwrap_or("unknown")
                ));
                if let Some(feature) = view.feature.as_deref().filter(|f| !f.is_empty()) {
                    output.push_str(&format!("{} {}\n", "Feature:".cyan().bold(), feature));
                }
                output.push_str(&format!(
                    "{} {} artifact(s), {} decision(s)\n",
                    "Progress:".cyan().bold(),
                    view.artifacts.len(),
                    view.decisions
                ));
            }
            None => output.push_str(&format!("{}\n", "No saved workflow state.".yellow())),
        }

        if !view.gates.is_empty() {
            output.push_str(&Self::section_header("Latest gate results"));
            for gate in &view.gates {
                let verdict = if gate.passed {
                    "pass".green()
                } else {
                    "fail".red()
                };
                output.push_str(&format!(
                    "  {:<26} {} {}/{} (need {}), {} abstained, attempt {}\n",
                    gate.gate_id,
                    verdict,
                    gate.approve_count,
                    gate.approve_count + gate.reject_count,
                    gate.threshold,
                    gate.abstain_count,
                    gate.attempt
                ));
            }
        }

        output.push_str(&Self::section_header("Latest session"));
        match &view.session {
            Some(session) => {
                let ended = session
                    .ended_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "in progress".to_string());
                output.push_str(&format!("  Session:      {}\n", session.session_id));
                output.push_str(&format!(
                    "  Started:      {}\n",
                    session.started_at.format("%Y-%m-%d %H:%M:%S")
                ));
                output.push_str(&format!("  Ended:        {}\n", ended));
                output.push_str(&format!(
                    "  Events:       {} ({} agent calls, {} votes, {} transitions)\n",
                    session.event_count,
                    session.agent_calls,
                    session.gate_votes,
                    session.phase_changes
                ));
                output.push_str(&format!(
                    "  Tokens:       {} in / {} out\n",
                    session.total_input_tokens, session.total_output_tokens
                ));
                output.push_str(&format!("  Cost:         ${:.4}\n", session.total_cost_usd));
                if !session.phases_completed.is_empty() {
                    output.push_str(&format!(
                        "  Phases:       {}\n",
                        session.phases_completed.join(" -> ")
                    ));
                }
            }
            None => output.push_str(&format!("  {}\n", "No ledger sessions recorded.".dimmed())),
        }

        output.push_str(&Self::footer());
        output
    }

    pub fn lessons(stats: &LessonsStats) -> String {
        let mut output = String::new();
        output.push_str(&Self::header("Lessons"));
        output.push('\n');
        output.push_str(&format!(
            "{} {} ({} promoted, {} format)\n",
            "Lessons:".cyan().bold(),
            stats.total_lessons,
            stats.promoted_lessons,
            stats.format_lessons
        ));
        output.push_str(&format!("{} {}\n", "Rules:".cyan().bold(), stats.total_rules));
        output.push_str(&format!(
            "{} {}\n",
            "Projects analyzed:".cyan().bold(),
            stats.projects_analyzed
        ));

        let mut steps: Vec<&String> = stats
            .lessons_by_step
            .keys()
            .chain(stats.rules_by_step.keys())
            .collect();
        steps.sort();
        steps.dedup();
        if !steps.is_empty() {
            output.push_str(&Self::section_header("By step"));
            for step in steps {
                output.push_str(&format!(
                    "  {:<20} {:>3} lesson(s) {:>3} rule(s)\n",
                    step,
                    stats.lessons_by_step.get(step).copied().unwrap_or(0),
                    stats.rules_by_step.get(step).copied().unwrap_or(0)
                ));
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Lessons and rules recorded for one step.
    pub fn step_lessons(step: &str, lessons: &[Lesson], rules: &[Rule]) -> String {
        let mut output = String::new();
        output.push_str(&Self::header(&format!("Lessons: {step}")));
        output.push('\n');

        output.push_str(&Self::section_header("Rules"));
        if rules.is_empty() {
            output.push_str(&format!("  {}\n", "none".dimmed()));
        }
        for rule in rules {
            let origin = if rule.is_builtin() { "builtin" } else { "promoted" };
            output.push_str(&format!(
                "  {} {} ({})\n    {}\n",
                "*".cyan(),
                rule.name.bold(),
                origin,
                rule.action
            ));
        }

        output.push_str(&Self::section_header("Lessons"));
        if lessons.is_empty() {
            output.push_str(&format!("  {}\n", "none".dimmed()));
        }
        for lesson in lessons {
            let promoted = if lesson.promoted {
                " promoted".green().to_string()
            } else {
                String::new()
            };
            output.push_str(&format!(
                "  {} {} [{}% x{}{}]\n",
                "*".cyan(),
                lesson.pattern,
                lesson.confidence,
                lesson.occurrences,
                promoted
            ));
            if !lesson.correction.is_empty() {
                output.push_str(&format!("    -> {}\n", lesson.correction));
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Panel shown when a gate escalates.
    pub fn escalation(request: &EscalationRequest) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "\n{}\n",
            "=".repeat(60).red()
        ));
        output.push_str(&format!(
            "{} {} at {}\n",
            "ESCALATION".red().bold(),
            request.gate_id.bold(),
            request.phase.display_name()
        ));
        output.push_str(&format!("{}\n", "=".repeat(60).red()));
        output.push_str(&format!("{} {}\n", "Project:".cyan().bold(), request.project_id));
        output.push_str(&format!("{} {}\n", "Attempts:".cyan().bold(), request.attempts));
        output.push_str(&format!("{} {}\n", "Reason:".cyan().bold(), request.reason));
        if !request.feedback.trim().is_empty() {
            output.push_str(&Self::section_header("Reviewer feedback"));
            output.push_str(&Self::indent(request.feedback.trim_end(), "  "));
            output.push('\n');
        }
        output.push_str(&format!(
            "\n{} gatekeeper resume {}\n",
            "After review, continue with:".dimmed(),
            request.project_id
        ));
        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gatekeeper_domain::{
        ConcernRecord, LearningPolicy, LessonsDocument, SessionSummary, WorkflowMode,
    };

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_escalated_outcome_suggests_resume() {
        plain();
        let mut state = WorkflowState::new("wishlist", WorkflowMode::Feature, "Save products");
        state.store_artifact(WorkflowPhase::Requirements, "REQ-1");
        let outcome = PhaseOutcome::Escalated {
            phase: WorkflowPhase::RequirementsReview,
            gate_id: "requirements_review".into(),
        };

        let text = ConsoleFormatter::outcome(&state, &outcome);
        assert!(text.contains("Outcome: Escalated"));
        assert!(text.contains("Gate requirements_review at requirements_review"));
        assert!(text.contains("Requirements"));
        assert!(text.contains("gatekeeper resume wishlist"));
    }

    #[test]
    fn test_complete_outcome_has_no_resume_hint() {
        plain();
        let state = WorkflowState::new("wishlist", WorkflowMode::Feature, "");
        let text =
            ConsoleFormatter::outcome(&state, &PhaseOutcome::Finished(TerminalKind::Complete));
        assert!(text.contains("All phases passed"));
        assert!(!text.contains("resume"));
    }

    #[test]
    fn test_assessment_only_for_ingest_artifact() {
        let mut state = WorkflowState::new("shop", WorkflowMode::Ingest, "../shop");
        assert!(ConsoleFormatter::assessment(&state).is_none());
        state.store_artifact(WorkflowPhase::IngestAssessment, "# Assessment\n");
        assert!(ConsoleFormatter::assessment(&state).unwrap().contains("# Assessment"));
    }

    #[test]
    fn test_status_with_session() {
        plain();
        let state = WorkflowState::new("wishlist", WorkflowMode::Feature, "Save products");
        let mut session = SessionSummary::new("2026-01-02_030405", "wishlist", Utc::now());
        session.total_cost_usd = 0.01234;
        session.phases_completed = vec!["ideation".into(), "prioritization".into()];

        let text = ConsoleFormatter::status(&StatusView::new("wishlist", Some(&state), Some(session)));
        assert!(text.contains("Phase: Ideation (feature)"));
        assert!(text.contains("Feature: Save products"));
        assert!(text.contains("2026-01-02_030405"));
        assert!(text.contains("in progress"));
        assert!(text.contains("$0.0123"));
        assert!(text.contains("ideation -> prioritization"));
    }

    #[test]
    fn test_status_without_anything() {
        plain();
        let text = ConsoleFormatter::status(&StatusView::new("ghost", None, None));
        assert!(text.contains("No saved workflow state."));
        assert!(text.contains("No ledger sessions recorded."));
    }

    #[test]
    fn test_step_lessons_lists_rules_and_lessons() {
        plain();
        let now = Utc::now();
        let mut doc = LessonsDocument::empty(now);
        let policy = LearningPolicy::default();
        let record = ConcernRecord {
            concern: "Passwords stored in plaintext".into(),
            correction: "Hash passwords with argon2".into(),
            voter_feedback: "security: plaintext passwords".into(),
        };
        doc.record_concern("security", &record, "shop", &policy, now);

        let text = ConsoleFormatter::step_lessons(
            "security",
            doc.lessons_for("security"),
            doc.rules_for("security"),
        );
        assert!(text.contains("Passwords stored in plaintext"));
        assert!(text.contains("-> Hash passwords with argon2"));

        let stats = ConsoleFormatter::lessons(&doc.stats());
        assert!(stats.contains("security"));
    }

    #[test]
    fn test_escalation_panel_indents_feedback() {
        plain();
        let request = EscalationRequest {
            project_id: "wishlist".into(),
            phase: WorkflowPhase::CodeReview,
            gate_id: "code_review".into(),
            attempts: 4,
            reason: "retries exhausted".into(),
            feedback: "## Concerns\n- missing tests".into(),
        };
        let text = ConsoleFormatter::escalation(&request);
        assert!(text.contains("ESCALATION code_review at Code Review"));
        assert!(text.contains("  ## Concerns\n  - missing tests"));
        assert!(text.contains("gatekeeper resume wishlist"));
    }
}
