use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::chapter::Chapter;
use crate::model::ids::{ChapterId, CourseId, LearnerId};
use crate::model::outline::CourseOutline;

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Durable fact that a learner finished one chapter.
///
/// Keyed by `(learner_id, course_id, chapter_id)`. `completed_at` is written
/// once by the first successful insert and never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub chapter_id: ChapterId,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        course_id: CourseId,
        chapter_id: ChapterId,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            course_id,
            chapter_id,
            completed_at,
        }
    }
}

/// Durable fact that a learner finished every chapter of a course.
///
/// At most one exists per `(learner_id, course_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeRecord {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub earned_at: DateTime<Utc>,
}

impl BadgeRecord {
    #[must_use]
    pub fn new(learner_id: LearnerId, course_id: CourseId, earned_at: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            course_id,
            earned_at,
        }
    }
}

//
// ─── PERCENTAGE ────────────────────────────────────────────────────────────────
//

/// `round(100 * completed / total)` with halves rounded up, in integer math.
///
/// Returns 0 for an empty course and clamps `completed` to `total`.
#[must_use]
pub fn completion_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let total = total as u64;
    let completed = (completed as u64).min(total);
    let pct = (200 * completed + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// How a chapter looks to a learner right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterState {
    Completed,
    Available,
    Locked,
}

impl ChapterState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChapterState::Completed => "completed",
            ChapterState::Available => "available",
            ChapterState::Locked => "locked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterProgress {
    pub chapter: Chapter,
    pub state: ChapterState,
}

/// A learner's progress through one course, derived from the outline and the
/// completed set. Holds no state of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    learner_id: LearnerId,
    course_id: CourseId,
    percentage: u8,
    completed: BTreeSet<ChapterId>,
    chapters: Vec<ChapterProgress>,
}

impl ProgressSnapshot {
    /// Derives progress for `learner_id` from the outline and their completions.
    ///
    /// Completions that are not part of the outline are dropped.
    #[must_use]
    pub fn derive(
        learner_id: LearnerId,
        outline: &CourseOutline,
        completed: &BTreeSet<ChapterId>,
    ) -> Self {
        let in_outline: BTreeSet<ChapterId> = outline
            .chapters()
            .iter()
            .map(Chapter::id)
            .filter(|id| completed.contains(id))
            .collect();

        let chapters = outline
            .chapters()
            .iter()
            .map(|chapter| {
                let state = if in_outline.contains(&chapter.id()) {
                    ChapterState::Completed
                } else if outline.is_accessible(chapter.id(), &in_outline) {
                    ChapterState::Available
                } else {
                    ChapterState::Locked
                };
                ChapterProgress {
                    chapter: chapter.clone(),
                    state,
                }
            })
            .collect();

        Self {
            learner_id,
            course_id: outline.course_id(),
            percentage: completion_percentage(in_outline.len(), outline.len()),
            completed: in_outline,
            chapters,
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// Completed chapter ids that belong to the outline.
    #[must_use]
    pub fn completed_chapter_ids(&self) -> &BTreeSet<ChapterId> {
        &self.completed
    }

    /// Every outline chapter with its current state, in outline order.
    #[must_use]
    pub fn chapters(&self) -> &[ChapterProgress] {
        &self.chapters
    }

    /// The chapter a learner should open next, or `None` once finished.
    #[must_use]
    pub fn next_chapter(&self) -> Option<&Chapter> {
        self.chapters
            .iter()
            .find(|c| c.state == ChapterState::Available)
            .map(|c| &c.chapter)
    }

    #[must_use]
    pub fn is_course_complete(&self) -> bool {
        !self.chapters.is_empty() && self.completed.len() == self.chapters.len()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
