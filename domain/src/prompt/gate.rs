//! Prompts for reviewers at a gate and for the agent revising rejected work

use crate::quorum::GateConfig;

const RESPONSE_FORMAT: &str = r#"Respond ONLY with valid JSON in this exact format:
{
    "vote": "approve" or "reject",
    "confidence": <1-100>,
    "reasoning": "Brief explanation of your decision",
    "concerns": ["list", "of", "specific", "concerns"],
    "suggestions": ["actionable", "improvement", "suggestions"]
}"#;

/// Templates for gate voting
pub struct GatePromptTemplate;

impl GatePromptTemplate {
    /// Prompt for one voter on a quorum gate
    pub fn vote(gate: &GateConfig, artifact: &str, context: &str) -> String {
        let context = if context.trim().is_empty() {
            "No additional context provided."
        } else {
            context
        };
        format!(
            r#"You are participating in a quality gate review: {name}

## Your Task
Evaluate the following artifact from your specific perspective.

## Gate Trigger
{trigger}

## Artifact to Review
{artifact}

## Additional Context
{context}

## Response Format
{RESPONSE_FORMAT}

Focus on your specific evaluation perspective. Be constructive in feedback."#,
            name = gate.name,
            trigger = gate.trigger,
        )
    }

    /// Prompt for the approver of a single-approver gate
    pub fn approval(gate: &GateConfig, artifact: &str) -> String {
        let criteria = gate
            .criteria()
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            r#"Review the following artifact for approval: {name}

## Approval Criteria
{criteria}

## Artifact
{artifact}

## Your Task
Evaluate if this artifact meets the criteria.
{RESPONSE_FORMAT}"#,
            name = gate.name,
        )
    }

    /// Prompt asking the producing agent to revise rejected work
    pub fn revision(artifact: &str, feedback: &str) -> String {
        format!(
            r#"Your previous work did not pass the quality gate.

## Feedback from reviewers:
{feedback}

## Original work:
{artifact}

## Task:
Please revise your work addressing the feedback above."#
        )
    }
}
