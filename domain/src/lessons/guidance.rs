//! Lesson guidance surfaced to production and assessment prompts.

use super::entities::{FORMAT_SCOPE, Lesson, LessonsDocument, Rule};
use super::learning::LearningPolicy;
use std::collections::BTreeSet;

const MAX_LESSONS: usize = 10;
const MAX_FORMAT_LESSONS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonGuidance {
    /// Built-in and promoted rules whose trigger applies.
    pub rules: Vec<Rule>,
    /// Unpromoted content lessons above the surfacing threshold.
    pub lessons: Vec<Lesson>,
    /// Unpromoted format lessons above the surfacing threshold.
    pub format: Vec<Lesson>,
}

impl LessonGuidance {
    pub fn for_step(
        doc: &LessonsDocument,
        step: &str,
        facts: &BTreeSet<String>,
        policy: &LearningPolicy,
    ) -> Self {
        let rules = doc
            .rules_for(step)
            .iter()
            .chain(doc.rules_for(FORMAT_SCOPE))
            .filter(|r| r.trigger.applies(facts))
            .cloned()
            .collect();

        Self {
            rules,
            lessons: top_unpromoted(doc.lessons_for(step), policy, MAX_LESSONS),
            format: top_unpromoted(&doc.format_rules, policy, MAX_FORMAT_LESSONS),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.lessons.is_empty() && self.format.is_empty()
    }

    /// Times these lessons caused a rejection.
    pub fn rejection_count(&self) -> u32 {
        self.lessons
            .iter()
            .chain(&self.format)
            .map(|l| l.occurrences)
            .sum()
    }

    /// Render as a mandatory checklist. Empty guidance renders as "".
    pub fn to_checklist(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut out = String::from(
            "## Mandatory Checklist\n\n\
             Reviewers rejected earlier work for the issues below. Address every \
             item explicitly: either show it is handled, with evidence, or state \
             why it does not apply.\n",
        );

        if !self.rules.is_empty() {
            out.push_str("\n### Rules\n");
            for rule in &self.rules {
                out.push_str(&format!("- **{}**: {}\n", rule.name, rule.action));
            }
        }

        if !self.lessons.is_empty() {
            out.push_str("\n### Lessons learned\n");
            for (i, lesson) in self.lessons.iter().enumerate() {
                push_lesson(&mut out, i + 1, lesson);
            }
        }

        if !self.format.is_empty() {
            out.push_str("\n### Output format\n");
            for lesson in &self.format {
                out.push_str(&format!("- {}\n", lesson.correction));
            }
        }

        let rejections = self.rejection_count();
        if rejections > 0 {
            out.push_str(&format!(
                "\nWork that ignored this checklist was rejected {rejections} times.\n"
            ));
        }
        out
    }
}

fn push_lesson(out: &mut String, n: usize, lesson: &Lesson) {
    out.push_str(&format!("{n}. {}\n", lesson.pattern));
    if !lesson.correction.is_empty() {
        out.push_str(&format!("   Required action: {}\n", lesson.correction));
    }
    out.push_str(&format!(
        "   (seen {}x, confidence {}%)\n",
        lesson.occurrences, lesson.confidence
    ));
}

fn top_unpromoted(lessons: &[Lesson], policy: &LearningPolicy, limit: usize) -> Vec<Lesson> {
    let mut picked: Vec<Lesson> = lessons
        .iter()
        .filter(|l| !l.promoted && l.confidence >= policy.surface_confidence)
        .cloned()
        .collect();
    picked.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then(b.occurrences.cmp(&a.occurrences))
    });
    picked.truncate(limit);
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::builtin::seed_builtin_rules;
    use crate::lessons::learning::ConcernRecord;
    use chrono::Utc;

    fn learn(doc: &mut LessonsDocument, step: &str, concern: &str, times: usize) {
        let policy = LearningPolicy::default();
        let record = ConcernRecord {
            concern: concern.to_string(),
            correction: format!("Fix: {concern}"),
            voter_feedback: String::new(),
        };
        for _ in 0..times {
            doc.record_concern(step, &record, "p", &policy, Utc::now());
        }
    }

    #[test]
    fn surfaces_applicable_rules_only() {
        let mut doc = LessonsDocument::empty(Utc::now());
        seed_builtin_rules(&mut doc, Utc::now());
        let facts: BTreeSet<String> = ["has_database".to_string()].into();
        let guidance =
            LessonGuidance::for_step(&doc, "security", &facts, &LearningPolicy::default());
        let ids: Vec<_> = guidance.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["builtin_sec_001", "builtin_sec_002"]);
    }

    #[test]
    fn low_confidence_lessons_stay_hidden() {
        let mut doc = LessonsDocument::empty(Utc::now());
        learn(&mut doc, "security", "Tokens logged in plaintext", 1);
        let guidance = LessonGuidance::for_step(
            &doc,
            "security",
            &BTreeSet::new(),
            &LearningPolicy::default(),
        );
        assert!(guidance.is_empty());
        assert_eq!(guidance.to_checklist(), "");
    }

    #[test]
    fn reinforced_lessons_surface_until_promoted() {
        let policy = LearningPolicy::default();
        let mut doc = LessonsDocument::empty(Utc::now());
        learn(&mut doc, "security", "Tokens logged in plaintext", 2);
        let guidance = LessonGuidance::for_step(&doc, "security", &BTreeSet::new(), &policy);
        assert_eq!(guidance.lessons.len(), 1);
        let checklist = guidance.to_checklist();
        assert!(checklist.contains("Tokens logged in plaintext"));
        assert!(checklist.contains("Required action: Fix: Tokens logged in plaintext"));
        assert!(checklist.contains("rejected 2 times"));

        learn(&mut doc, "security", "Tokens logged in plaintext", 1);
        doc.promote_ready(&policy, Utc::now());
        let guidance = LessonGuidance::for_step(&doc, "security", &BTreeSet::new(), &policy);
        assert!(guidance.lessons.is_empty());
        assert_eq!(guidance.rules.len(), 1);
    }

    #[test]
    fn format_lessons_surface_for_every_step() {
        let mut doc = LessonsDocument::empty(Utc::now());
        learn(&mut doc, "security", "Impact field is an empty string", 2);
        let guidance = LessonGuidance::for_step(
            &doc,
            "performance",
            &BTreeSet::new(),
            &LearningPolicy::default(),
        );
        assert_eq!(guidance.format.len(), 1);
        assert!(guidance.to_checklist().contains("### Output format"));
    }
}
