//! Prompts for assessor agents

use crate::assessment::{AssessmentContext, Finding, StepAssessment, step_profile};

const RESPONSE_FORMAT: &str = r#"Respond with a JSON object:
```json
{
    "score": <0-100>,
    "summary": "Brief summary of assessment",
    "findings": [
        {
            "severity": "critical|high|medium|low|info",
            "title": "Finding title",
            "description": "What was found",
            "location": "specific/file/path:line",
            "evidence": "Code snippet or specific observation",
            "recommendation": "How to fix"
        }
    ]
}
```

Only report issues you can point to in the code. An empty findings array is
a valid answer."#;

/// Templates for the ingest assessment steps
pub struct AssessmentPromptTemplate;

impl AssessmentPromptTemplate {
    pub fn step(
        step: &str,
        context: &AssessmentContext,
        rule_findings: &[Finding],
        checklist: &str,
    ) -> String {
        let profile = step_profile(step);
        let facts = if context.facts.is_empty() {
            "None recorded".to_string()
        } else {
            context.facts.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let already = if rule_findings.is_empty() {
            "None".to_string()
        } else {
            rule_findings
                .iter()
                .map(|f| format!("- [{}] {}", f.severity.as_str(), f.title))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut prompt = format!(
            r#"You are a {role} specializing in {focus}.

## Your Task
Analyze this codebase and provide a comprehensive assessment of {subject}.

## Project Context
- Project: {project}
- Source: {source}
- Facts: {facts}

{summary}

## Rules Already Applied (don't duplicate these findings)
{already}

## Response Format
{RESPONSE_FORMAT}"#,
            role = profile.role,
            focus = profile.focus,
            subject = step.replace('_', " "),
            project = context.project_id,
            source = context.source_path,
            summary = context.summary,
        );

        if !checklist.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(checklist);
        }
        prompt
    }

    /// Step prompt extended with the rejected attempt and the voters' feedback.
    pub fn revision(
        step: &str,
        context: &AssessmentContext,
        rule_findings: &[Finding],
        checklist: &str,
        previous: &StepAssessment,
        feedback: &str,
    ) -> String {
        let mut top: Vec<String> = previous
            .findings
            .iter()
            .take(5)
            .map(|f| format!("- [{}] {}", f.severity.as_str().to_uppercase(), f.title))
            .collect();
        if previous.findings.len() > 5 {
            top.push(format!("- ... and {} more findings", previous.findings.len() - 5));
        }
        let score = previous
            .score
            .map(|s| format!("{s}/100"))
            .unwrap_or_else(|| "not given".to_string());

        format!(
            r#"{base}

## REVISION REQUIRED - Previous Assessment Was Rejected

Your previous assessment was rejected by voters. Here is their feedback:

{feedback}

### Previous Assessment Summary:
- Score: {score}
- Findings count: {count}
{top}

### What You Must Fix:
1. Address every format issue mentioned in the feedback
2. Provide specific evidence and locations
3. Fill all required fields with meaningful values"#,
            base = Self::step(step, context, rule_findings, checklist),
            count = previous.findings.len(),
            top = top.join("\n"),
        )
    }
}
