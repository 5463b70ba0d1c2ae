//! Combined report for the ingest assessment phase.

use super::finding::{Finding, Severity};
use serde::{Deserialize, Serialize};

/// How a single step's review ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Approved,
    Escalated,
    /// The assessor never produced usable output.
    Failed,
    Cancelled,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Approved => "approved",
            StepStatus::Escalated => "escalated",
            StepStatus::Failed => "failed",
            StepStatus::Cancelled => "cancelled",
        }
    }

    /// Approved and escalated steps are final; the others may run again.
    pub fn is_settled(&self) -> bool {
        matches!(self, StepStatus::Approved | StepStatus::Escalated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub status: StepStatus,
    pub score: Option<u8>,
    pub summary: String,
    pub findings: Vec<Finding>,
    /// Voting attempts the step's gate needed.
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentReport {
    pub project_id: String,
    pub steps: Vec<StepReport>,
}

impl AssessmentReport {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            steps: Vec::new(),
        }
    }

    /// Steps whose result should be kept when the assessment runs again.
    pub fn settled_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status.is_settled())
    }

    pub fn escalated_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Escalated)
            .map(|s| s.step.as_str())
            .collect()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.steps
            .iter()
            .flat_map(|s| &s.findings)
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Mean of the scored steps.
    pub fn overall_score(&self) -> Option<u8> {
        let scores: Vec<u32> = self.steps.iter().filter_map(|s| s.score).map(u32::from).collect();
        if scores.is_empty() {
            return None;
        }
        Some((scores.iter().sum::<u32>() as f64 / scores.len() as f64).round() as u8)
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Assessment: {}\n\n", self.project_id);
        if let Some(score) = self.overall_score() {
            out.push_str(&format!("Overall score: {score}/100\n\n"));
        }
        out.push_str("| Step | Status | Score | Findings |\n|---|---|---|---|\n");
        for step in &self.steps {
            let score = step.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                step.step,
                step.status.as_str(),
                score,
                step.findings.len()
            ));
        }

        for step in &self.steps {
            out.push_str(&format!("\n## {}\n", step.step));
            if step.status == StepStatus::Escalated {
                out.push_str("\n**Escalated:** reviewers did not approve this step.\n");
            }
            if !step.summary.is_empty() {
                out.push_str(&format!("\n{}\n", step.summary));
            }
            for f in &step.findings {
                out.push_str(&format!(
                    "\n- **[{}] {}** ({})\n",
                    f.severity.as_str(),
                    f.title,
                    f.id
                ));
                if f.description != f.title {
                    out.push_str(&format!("  {}\n", f.description));
                }
                for e in &f.evidence {
                    out.push_str(&format!("  - `{e}`\n"));
                }
                if !f.recommendation.is_empty() {
                    out.push_str(&format!("  Recommendation: {}\n", f.recommendation));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::finding::FindingSource;

    fn step(name: &str, status: StepStatus, score: Option<u8>, severities: &[Severity]) -> StepReport {
        StepReport {
            step: name.into(),
            status,
            score,
            summary: String::new(),
            findings: severities
                .iter()
                .enumerate()
                .map(|(i, s)| Finding {
                    id: format!("{name}-{i}"),
                    title: format!("issue {i}"),
                    severity: *s,
                    description: "details".into(),
                    evidence: vec!["src/lib.rs:1".into()],
                    recommendation: String::new(),
                    source: FindingSource::Agent,
                })
                .collect(),
            attempts: 1,
        }
    }

    #[test]
    fn aggregates_scores_and_severities() {
        let mut report = AssessmentReport::new("shop");
        report.steps.push(step("security", StepStatus::Approved, Some(60), &[Severity::Critical, Severity::Low]));
        report.steps.push(step("testing", StepStatus::Escalated, Some(81), &[Severity::Critical]));
        report.steps.push(step("performance", StepStatus::Failed, None, &[]));

        assert_eq!(report.overall_score(), Some(71));
        assert_eq!(report.count_by_severity(Severity::Critical), 2);
        assert_eq!(report.escalated_steps(), vec!["testing"]);
    }

    #[test]
    fn only_approved_and_escalated_steps_are_settled() {
        let mut report = AssessmentReport::new("shop");
        report.steps.push(step("security", StepStatus::Approved, Some(60), &[]));
        report.steps.push(step("testing", StepStatus::Cancelled, None, &[]));
        report.steps.push(step("performance", StepStatus::Failed, None, &[]));
        report.steps.push(step("architecture", StepStatus::Escalated, Some(40), &[]));

        let settled: Vec<&str> = report.settled_steps().map(|s| s.step.as_str()).collect();
        assert_eq!(settled, vec!["security", "architecture"]);
    }

    #[test]
    fn markdown_marks_escalated_steps() {
        let mut report = AssessmentReport::new("shop");
        report.steps.push(step("testing", StepStatus::Escalated, None, &[Severity::High]));
        let md = report.to_markdown();
        assert!(md.contains("| testing | escalated | - | 1 |"));
        assert!(md.contains("**Escalated:**"));
        assert!(md.contains("[high] issue 0"));
    }
}
