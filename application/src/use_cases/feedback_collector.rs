//! Feedback Collector use case
//!
//! Turns the concerns of a rejected gate into lessons, promotes lessons that
//! crossed the thresholds, and hands the surviving guidance back to prompts.

use crate::ports::lessons_repository::{LessonsRepository, RepositoryError};
use chrono::Utc;
use gatekeeper_domain::{
    ConcernRecord, GateResult, LearningPolicy, LessonGuidance, LessonUpdate, LessonsDocument,
    LessonsStats, Rule, best_correction, seed_builtin_rules,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// What one call to [`FeedbackCollector::collect`] changed.
#[derive(Debug, Clone, Default)]
pub struct CollectReport {
    pub updates: Vec<LessonUpdate>,
    /// Rules created by promotion, with the scope they were filed under.
    pub promoted: Vec<(String, Rule)>,
}

pub struct FeedbackCollector {
    repository: Arc<dyn LessonsRepository>,
    document: Mutex<Option<LessonsDocument>>,
    policy: LearningPolicy,
}

impl FeedbackCollector {
    pub fn new(repository: Arc<dyn LessonsRepository>, policy: LearningPolicy) -> Self {
        Self {
            repository,
            document: Mutex::new(None),
            policy,
        }
    }

    pub fn policy(&self) -> &LearningPolicy {
        &self.policy
    }

    /// Learn from every concern of a rejected gate result.
    ///
    /// Passing results are ignored. The document is saved once per call.
    pub async fn collect(
        &self,
        step: &str,
        result: &GateResult,
        project_id: &str,
    ) -> Result<CollectReport, RepositoryError> {
        if result.passed {
            return Ok(CollectReport::default());
        }

        let mut guard = self.document.lock().await;
        // Changes go to a copy that replaces the cache only once it is saved.
        let mut doc = self.loaded(&mut guard).await?.clone();
        let now = Utc::now();

        let mut report = CollectReport::default();
        for vote in &result.votes {
            for concern in vote.concerns.iter().filter(|c| !c.trim().is_empty()) {
                let record = ConcernRecord {
                    concern: concern.clone(),
                    correction: best_correction(concern, &vote.suggestions),
                    voter_feedback: vote.reasoning.clone(),
                };
                let update = doc.record_concern(step, &record, project_id, &self.policy, now);
                debug!("Lesson {} updated from {}", update.lesson_id(), vote.voter_id);
                report.updates.push(update);
            }
        }

        report.promoted = doc.promote_ready(&self.policy, now);
        for (scope, rule) in &report.promoted {
            info!("Promoted lesson to rule {} for {}", rule.id, scope);
        }

        doc.refresh_totals();
        self.repository.save(&doc).await?;
        *guard = Some(doc);
        Ok(report)
    }

    /// Rules and lessons to surface in the prompt for `step`.
    pub async fn guidance(
        &self,
        step: &str,
        facts: &BTreeSet<String>,
    ) -> Result<LessonGuidance, RepositoryError> {
        let mut guard = self.document.lock().await;
        let doc = self.loaded(&mut guard).await?;
        Ok(LessonGuidance::for_step(doc, step, facts, &self.policy))
    }

    pub async fn stats(&self) -> Result<LessonsStats, RepositoryError> {
        let mut guard = self.document.lock().await;
        Ok(self.loaded(&mut guard).await?.stats())
    }

    async fn loaded<'a>(
        &self,
        slot: &'a mut Option<LessonsDocument>,
    ) -> Result<&'a mut LessonsDocument, RepositoryError> {
        if slot.is_none() {
            let mut doc = self.repository.load().await?;
            let seeded = seed_builtin_rules(&mut doc, Utc::now());
            if seeded > 0 {
                debug!("Seeded {} built-in rules", seeded);
                doc.refresh_totals();
            }
            *slot = Some(doc);
        }
        match slot {
            Some(doc) => Ok(doc),
            None => Err(RepositoryError::Corrupt("lessons document not loaded".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryLessons;
    use gatekeeper_domain::{Ballot, GateConfig, QuorumRule, Vote};

    fn rejected(concern: &str) -> GateResult {
        let gate = GateConfig::quorum(
            "assessment_step",
            "Assessment Step",
            vec!["v1".into(), "v2".into()],
            QuorumRule::Majority,
        );
        let ballots: Vec<Ballot> = vec![
            Vote::fail("v1", "QA")
                .with_reasoning("Not good enough")
                .with_concerns(vec![concern.to_string()])
                .with_suggestions(vec!["Add integration tests for checkout".into()])
                .into(),
            Vote::fail("v2", "Security").into(),
        ];
        GateResult::tally(&gate, 0, ballots, Utc::now())
    }

    fn collector(repo: Arc<MemoryLessons>) -> FeedbackCollector {
        FeedbackCollector::new(repo, LearningPolicy::default())
    }

    #[tokio::test]
    async fn passing_result_is_ignored() {
        let repo = Arc::new(MemoryLessons::default());
        let collector = collector(repo.clone());
        let mut result = rejected("Checkout flow has no tests");
        result.passed = true;

        let report = collector.collect("testing", &result, "shop").await.unwrap();
        assert!(report.updates.is_empty());
        assert_eq!(*repo.saves.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn recurring_concern_is_promoted_once() {
        let repo = Arc::new(MemoryLessons::default());
        let collector = collector(repo.clone());

        for project in ["p1", "p2", "p3"] {
            collector
                .collect("testing", &rejected("Checkout flow has no integration tests"), project)
                .await
                .unwrap();
        }
        // 50 -> 65 -> 80 with 3 occurrences: promoted on the third.
        let stats = collector.stats().await.unwrap();
        assert_eq!(stats.lessons_by_step.get("testing"), Some(&1));
        assert_eq!(stats.promoted_lessons, 1);

        let again = collector
            .collect("testing", &rejected("Checkout flow has no integration tests"), "p4")
            .await
            .unwrap();
        assert!(again.promoted.is_empty());

        let saved = repo.document.lock().unwrap().clone().unwrap();
        let promoted: Vec<_> = saved
            .rules_for("testing")
            .iter()
            .filter(|r| !r.is_builtin())
            .collect();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].action, "Add integration tests for checkout");
    }

    #[tokio::test]
    async fn failed_save_leaves_the_cached_document_untouched() {
        let repo = Arc::new(MemoryLessons::default());
        let collector = collector(repo.clone());
        let concern = "Checkout flow has no integration tests";

        repo.set_failing(true);
        for project in ["p1", "p2", "p3"] {
            assert!(collector.collect("testing", &rejected(concern), project).await.is_err());
        }
        let stats = collector.stats().await.unwrap();
        assert_eq!(stats.lessons_by_step.get("testing").copied().unwrap_or(0), 0);
        assert_eq!(stats.promoted_lessons, 0);

        repo.set_failing(false);
        let report = collector.collect("testing", &rejected(concern), "p4").await.unwrap();
        assert!(report.promoted.is_empty());
        let saved = repo.document.lock().unwrap().clone().unwrap();
        assert_eq!(saved.stats().lessons_by_step.get("testing"), Some(&1));
        assert_eq!(saved.stats().promoted_lessons, 0);
    }

    #[tokio::test]
    async fn builtin_rules_are_seeded_into_guidance() {
        let repo = Arc::new(MemoryLessons::default());
        let collector = collector(repo);
        let guidance = collector
            .guidance("testing", &BTreeSet::from(["has_tests".to_string()]))
            .await
            .unwrap();
        assert!(guidance.rules.iter().any(|r| r.id == "builtin_test_001"));
    }
}
