//! Recording concerns as lessons and promoting lessons to rules.

use super::classify::{ConcernKind, classify};
use super::entities::{FORMAT_SCOPE, Lesson, LessonsDocument, Rule, RuleTrigger};
use super::similarity::is_similar;
use crate::core::text;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds that drive the learning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningPolicy {
    pub initial_confidence: u8,
    pub confidence_increment: u8,
    pub promotion_confidence: u8,
    pub promotion_occurrences: u32,
    /// Unpromoted lessons at or above this are surfaced to prompts.
    pub surface_confidence: u8,
}

impl Default for LearningPolicy {
    fn default() -> Self {
        Self {
            initial_confidence: 50,
            confidence_increment: 15,
            promotion_confidence: 80,
            promotion_occurrences: 3,
            surface_confidence: 65,
        }
    }
}

/// Floor applied to every lesson confidence.
pub const LESSON_CONFIDENCE_FLOOR: u8 = 50;
pub const LESSON_CONFIDENCE_CEILING: u8 = 100;

fn clamp_lesson_confidence(value: u32) -> u8 {
    value.clamp(
        LESSON_CONFIDENCE_FLOOR as u32,
        LESSON_CONFIDENCE_CEILING as u32,
    ) as u8
}

/// A concern raised at a rejected gate, ready to be learned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcernRecord {
    pub concern: String,
    pub correction: String,
    pub voter_feedback: String,
}

/// What recording one concern did to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonUpdate {
    Created { lesson_id: String, kind: ConcernKind },
    Reinforced {
        lesson_id: String,
        kind: ConcernKind,
        confidence: u8,
        occurrences: u32,
    },
}

impl LessonUpdate {
    pub fn lesson_id(&self) -> &str {
        match self {
            LessonUpdate::Created { lesson_id, .. } | LessonUpdate::Reinforced { lesson_id, .. } => {
                lesson_id
            }
        }
    }
}

impl Lesson {
    pub fn is_ready_for_promotion(&self, policy: &LearningPolicy) -> bool {
        !self.promoted
            && self.confidence >= policy.promotion_confidence
            && self.occurrences >= policy.promotion_occurrences
    }

    fn reinforce(&mut self, project_id: &str, policy: &LearningPolicy, now: DateTime<Utc>) {
        self.occurrences = self.occurrences.saturating_add(1);
        self.confidence =
            clamp_lesson_confidence(self.confidence as u32 + policy.confidence_increment as u32);
        if !self.learned_from.iter().any(|p| p == project_id) {
            self.learned_from.push(project_id.to_string());
        }
        self.updated_at = now;
    }

    fn to_rule(&self, id: String, now: DateTime<Utc>) -> Rule {
        Rule {
            id,
            name: format!("Check: {}", text::clip(&self.pattern, 50)),
            trigger: RuleTrigger::Always,
            action: self.correction.clone(),
            source_lesson: Some(self.id.clone()),
            created_at: now,
        }
    }
}

impl LessonsDocument {
    /// Record one concern from a rejected gate for `step`.
    ///
    /// Format concerns go to the shared format section, content concerns to
    /// the step's lessons. A near-duplicate is reinforced instead of added.
    pub fn record_concern(
        &mut self,
        step: &str,
        record: &ConcernRecord,
        project_id: &str,
        policy: &LearningPolicy,
        now: DateTime<Utc>,
    ) -> LessonUpdate {
        let kind = classify(&record.concern);
        self.record_project(project_id);

        let existing = match kind {
            ConcernKind::Format => self
                .format_rules
                .iter_mut()
                .find(|l| is_similar(&l.pattern, &record.concern)),
            ConcernKind::Content => self
                .lessons
                .get_mut(step)
                .and_then(|ls| ls.iter_mut().find(|l| is_similar(&l.pattern, &record.concern))),
        };

        if let Some(lesson) = existing {
            lesson.reinforce(project_id, policy, now);
            return LessonUpdate::Reinforced {
                lesson_id: lesson.id.clone(),
                kind,
                confidence: lesson.confidence,
                occurrences: lesson.occurrences,
            };
        }

        let prefix = match kind {
            ConcernKind::Format => "fmt".to_string(),
            ConcernKind::Content => step.to_string(),
        };
        let lesson = Lesson {
            id: self.next_id(&prefix),
            pattern: record.concern.trim().to_string(),
            voter_feedback: text::clip(&record.voter_feedback, 1000).to_string(),
            correction: record.correction.clone(),
            confidence: clamp_lesson_confidence(policy.initial_confidence as u32),
            occurrences: 1,
            learned_from: vec![project_id.to_string()],
            promoted: false,
            created_at: now,
            updated_at: now,
        };
        let lesson_id = lesson.id.clone();
        match kind {
            ConcernKind::Format => self.format_rules.push(lesson),
            ConcernKind::Content => self.lessons.entry(step.to_string()).or_default().push(lesson),
        }
        LessonUpdate::Created { lesson_id, kind }
    }

    /// Promote every lesson that crossed the thresholds. Each lesson is
    /// promoted at most once.
    pub fn promote_ready(&mut self, policy: &LearningPolicy, now: DateTime<Utc>) -> Vec<(String, Rule)> {
        let mut ready: Vec<(String, Lesson)> = Vec::new();
        for (step, lessons) in &self.lessons {
            for lesson in lessons.iter().filter(|l| l.is_ready_for_promotion(policy)) {
                ready.push((step.clone(), lesson.clone()));
            }
        }
        for lesson in self.format_rules.iter().filter(|l| l.is_ready_for_promotion(policy)) {
            ready.push((FORMAT_SCOPE.to_string(), lesson.clone()));
        }

        let mut promoted = Vec::new();
        for (scope, lesson) in ready {
            let rule_id = self.next_id(&format!("rule_{scope}"));
            let rule = lesson.to_rule(rule_id, now);
            self.insert_rule(&scope, rule.clone());
            self.mark_promoted(&scope, &lesson.id, now);
            promoted.push((scope, rule));
        }
        promoted
    }

    fn mark_promoted(&mut self, scope: &str, lesson_id: &str, now: DateTime<Utc>) {
        let lessons = if scope == FORMAT_SCOPE {
            Some(&mut self.format_rules)
        } else {
            self.lessons.get_mut(scope)
        };
        if let Some(lesson) = lessons
            .into_iter()
            .flatten()
            .find(|l| l.id == lesson_id)
        {
            lesson.promoted = true;
            lesson.updated_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(concern: &str) -> ConcernRecord {
        ConcernRecord {
            concern: concern.to_string(),
            correction: "Document every public endpoint".to_string(),
            voter_feedback: "The API surface is undocumented".to_string(),
        }
    }

    #[test]
    fn new_concern_starts_at_fifty() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let policy = LearningPolicy::default();
        let update = doc.record_concern(
            "documentation",
            &record("Public endpoints lack docs"),
            "p1",
            &policy,
            Utc::now(),
        );
        assert!(matches!(update, LessonUpdate::Created { kind: ConcernKind::Content, .. }));
        let lesson = &doc.lessons_for("documentation")[0];
        assert_eq!(lesson.confidence, 50);
        assert_eq!(lesson.occurrences, 1);
        assert_eq!(lesson.learned_from, vec!["p1"]);
    }

    #[test]
    fn initial_confidence_is_clamped_to_floor() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let policy = LearningPolicy {
            initial_confidence: 10,
            ..Default::default()
        };
        doc.record_concern("security", &record("Open redirect"), "p", &policy, Utc::now());
        assert_eq!(doc.lessons_for("security")[0].confidence, 50);
    }

    #[test]
    fn recurrence_reinforces_and_caps_at_hundred() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let policy = LearningPolicy::default();
        for i in 0..6 {
            doc.record_concern(
                "security",
                &record("Hardcoded secrets in settings module"),
                &format!("p{}", i % 2),
                &policy,
                Utc::now(),
            );
        }
        let lessons = doc.lessons_for("security");
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].occurrences, 6);
        assert_eq!(lessons[0].confidence, 100);
        assert_eq!(lessons[0].learned_from, vec!["p0", "p1"]);
    }

    #[test]
    fn format_concerns_are_shared_across_steps() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let policy = LearningPolicy::default();
        doc.record_concern("security", &record("Missing field effort_hours"), "p", &policy, Utc::now());
        let update = doc.record_concern(
            "performance",
            &record("effort_hours missing field on findings"),
            "p",
            &policy,
            Utc::now(),
        );
        assert!(matches!(update, LessonUpdate::Reinforced { kind: ConcernKind::Format, occurrences: 2, .. }));
        assert_eq!(doc.format_rules.len(), 1);
        assert!(doc.lessons.is_empty());
    }

    #[test]
    fn third_occurrence_promotes_exactly_one_rule() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let policy = LearningPolicy::default();
        let concern = "No input validation on upload handler";
        for project in ["a", "b", "c"] {
            doc.record_concern("security", &record(concern), project, &policy, Utc::now());
            doc.promote_ready(&policy, Utc::now());
        }
        let lesson = &doc.lessons_for("security")[0];
        assert_eq!(lesson.confidence, 80);
        assert!(lesson.promoted);
        let rules = doc.rules_for("security");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source_lesson.as_deref(), Some(lesson.id.as_str()));
        assert_eq!(rules[0].trigger, RuleTrigger::Always);
        assert!(rules[0].name.starts_with("Check: No input validation"));
    }

    #[test]
    fn promoted_lesson_is_never_promoted_again() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let policy = LearningPolicy::default();
        for _ in 0..3 {
            doc.record_concern("testing", &record("Flaky integration tests"), "p", &policy, Utc::now());
        }
        assert_eq!(doc.promote_ready(&policy, Utc::now()).len(), 1);
        for _ in 0..4 {
            doc.record_concern("testing", &record("Flaky integration tests"), "p", &policy, Utc::now());
            assert!(doc.promote_ready(&policy, Utc::now()).is_empty());
        }
        assert_eq!(doc.rules_for("testing").len(), 1);
        assert!(doc.lessons_for("testing")[0].promoted);
    }

    #[test]
    fn high_confidence_alone_does_not_promote() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let policy = LearningPolicy {
            initial_confidence: 90,
            ..Default::default()
        };
        doc.record_concern("security", &record("Weak hashing for passwords"), "p", &policy, Utc::now());
        assert!(doc.promote_ready(&policy, Utc::now()).is_empty());
    }

    #[test]
    fn format_lessons_promote_into_format_scope() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let policy = LearningPolicy::default();
        for _ in 0..3 {
            doc.record_concern("security", &record("Recommendation is vague"), "p", &policy, Utc::now());
        }
        let promoted = doc.promote_ready(&policy, Utc::now());
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].0, FORMAT_SCOPE);
        assert!(doc.format_rules[0].promoted);
    }
}
