use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use course_core::model::{
    BadgeRecord, Chapter, ChapterId, CompletionRecord, CourseId, CourseOutline, LearnerId,
    ProgressSnapshot, completion_percentage,
};
use storage::repository::{BadgeRepository, ProgressRepository, Storage, StorageError};

use crate::Clock;
use crate::badge_evaluator::BadgeEvaluator;
use crate::course_graph::CourseGraph;
use crate::error::ProgressError;
use crate::retry::RetryPolicy;

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// Result of a `complete_chapter` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub percentage: u8,
    /// True only for the call that created the course badge.
    pub badge_issued: bool,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Sole entry point for querying and mutating a learner's course progress.
///
/// Holds no state between calls: every answer is derived from the outline and
/// the stored completions, and every write is a single insert-if-absent.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    graph: CourseGraph,
    progress: Arc<dyn ProgressRepository>,
    badges: Arc<dyn BadgeRepository>,
    evaluator: BadgeEvaluator,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            graph: CourseGraph::new(Arc::clone(&storage.catalog)),
            progress: Arc::clone(&storage.progress),
            badges: Arc::clone(&storage.badges),
            evaluator: BadgeEvaluator::new(clock, Arc::clone(&storage.badges)),
        }
    }

    /// Completion percentage of a course for a learner, 0 for an empty course.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` for an unknown course, or
    /// `ProgressError::StoreUnavailable` if storage fails.
    pub async fn percentage(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<u8, ProgressError> {
        let outline = self.graph.outline(course_id).await?;
        let completed = self
            .progress
            .completed_chapters(learner_id, course_id)
            .await?;
        Ok(percentage_of(&outline, &completed))
    }

    /// Full progress view: percentage, completed chapter ids and per-chapter
    /// state.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` for an unknown course, or
    /// `ProgressError::StoreUnavailable` if storage fails.
    pub async fn progress(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<ProgressSnapshot, ProgressError> {
        let outline = self.graph.outline(course_id).await?;
        let completed = self
            .progress
            .completed_chapters(learner_id, course_id)
            .await?;
        Ok(ProgressSnapshot::derive(learner_id, &outline, &completed))
    }

    /// Badges held by a learner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if storage fails.
    pub async fn badges(&self, learner_id: LearnerId) -> Result<Vec<BadgeRecord>, ProgressError> {
        Ok(self.badges.badges_for_learner(learner_id).await?)
    }

    /// The stored completion of one chapter, carrying its first `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if storage fails.
    pub async fn completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        chapter_id: ChapterId,
    ) -> Result<Option<CompletionRecord>, ProgressError> {
        Ok(self
            .progress
            .completion(learner_id, course_id, chapter_id)
            .await?)
    }

    /// Record that a learner finished a chapter, then re-evaluate the badge.
    ///
    /// Idempotent: repeating a completed call returns the current percentage
    /// with `badge_issued = false` and writes nothing, unless the course is
    /// complete and its badge is still missing, in which case the badge is
    /// issued now.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` / `ChapterNotFound` for ids the
    /// catalog does not know, `ProgressError::PrerequisiteNotMet` when the
    /// preceding chapter is incomplete, and `ProgressError::StoreUnavailable`
    /// on storage failure. A store failure after the completion was written
    /// leaves the completion in place; retrying converges.
    pub async fn complete_chapter(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        chapter_id: ChapterId,
    ) -> Result<CompletionOutcome, ProgressError> {
        let outline = self.graph.outline(course_id).await?;
        if !outline.contains(chapter_id) {
            return Err(ProgressError::ChapterNotFound {
                course: course_id,
                chapter: chapter_id,
            });
        }

        let completed = self
            .progress
            .completed_chapters(learner_id, course_id)
            .await?;
        if completed.contains(&chapter_id) {
            debug!(%learner_id, %course_id, %chapter_id, "chapter already completed");
            return self.settle_existing(learner_id, &outline, &completed).await;
        }

        if !CourseGraph::is_accessible(&outline, chapter_id, &completed) {
            let prerequisite = outline
                .predecessor(chapter_id)
                .map_or(chapter_id, Chapter::id);
            return Err(ProgressError::PrerequisiteNotMet {
                chapter: chapter_id,
                prerequisite,
            });
        }

        let record = CompletionRecord::new(learner_id, course_id, chapter_id, self.clock.now());
        let inserted = match self.progress.insert_completion_if_absent(&record).await {
            Ok(inserted) => inserted,
            Err(StorageError::Conflict) => false,
            Err(err) => return Err(err.into()),
        };

        let completed = self
            .progress
            .completed_chapters(learner_id, course_id)
            .await?;
        if !inserted {
            debug!(%learner_id, %course_id, %chapter_id, "completion written by a concurrent request");
            return self.settle_existing(learner_id, &outline, &completed).await;
        }

        let percentage = percentage_of(&outline, &completed);
        let badge_issued = self
            .evaluator
            .evaluate(learner_id, &outline, &completed)
            .await
            .inspect_err(|err| {
                warn!(%learner_id, %course_id, %chapter_id, error = %err, "badge evaluation failed after completion");
            })?;

        info!(%learner_id, %course_id, %chapter_id, percentage, badge_issued, "chapter completed");
        Ok(CompletionOutcome {
            percentage,
            badge_issued,
        })
    }

    /// `complete_chapter`, retried on `StoreUnavailable` per `policy`.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// non-retryable error immediately.
    pub async fn complete_chapter_with_retry(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        chapter_id: ChapterId,
        policy: RetryPolicy,
    ) -> Result<CompletionOutcome, ProgressError> {
        let mut retry = 0;
        loop {
            match self.complete_chapter(learner_id, course_id, chapter_id).await {
                Err(err) if err.is_retryable() && retry < policy.max_retries => {
                    retry += 1;
                    let delay = policy.delay_for(retry);
                    warn!(retry, ?delay, error = %err, "retrying chapter completion");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// No-op path for a chapter that is already complete.
    ///
    /// The evaluator only writes when the course is complete and the badge is
    /// missing, which happens after an earlier evaluation failed.
    async fn settle_existing(
        &self,
        learner_id: LearnerId,
        outline: &CourseOutline,
        completed: &BTreeSet<ChapterId>,
    ) -> Result<CompletionOutcome, ProgressError> {
        let badge_issued = self
            .evaluator
            .evaluate(learner_id, outline, completed)
            .await?;
        if badge_issued {
            warn!(%learner_id, course_id = %outline.course_id(), "issued a badge missing from an earlier completion");
        }
        Ok(CompletionOutcome {
            percentage: percentage_of(outline, completed),
            badge_issued,
        })
    }
}

fn percentage_of(outline: &CourseOutline, completed: &BTreeSet<ChapterId>) -> u8 {
    completion_percentage(outline.completed_count(completed), outline.len())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
