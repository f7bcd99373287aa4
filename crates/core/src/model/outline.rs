use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::chapter::Chapter;
use crate::model::ids::{ChapterId, CourseId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutlineError {
    #[error("chapter {chapter} belongs to course {actual}, not {expected}")]
    ForeignChapter {
        chapter: ChapterId,
        expected: CourseId,
        actual: CourseId,
    },

    #[error("chapter {0} appears more than once")]
    DuplicateChapter(ChapterId),

    #[error("order index {0} is used by more than one chapter")]
    DuplicateOrderIndex(u32),
}

//
// ─── OUTLINE ───────────────────────────────────────────────────────────────────
//

/// The chapters of one course, sorted ascending by `order_index`.
///
/// Accessibility is a strict linear chain: the chapter at position `i` is open
/// once the chapter at `i - 1` is completed. The first chapter is always open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutline {
    course_id: CourseId,
    chapters: Vec<Chapter>,
}

impl CourseOutline {
    /// Builds an outline from chapters in any order.
    ///
    /// # Errors
    ///
    /// Returns `OutlineError` if a chapter belongs to another course, or if a
    /// chapter id or order index repeats.
    pub fn new(course_id: CourseId, mut chapters: Vec<Chapter>) -> Result<Self, OutlineError> {
        let mut ids = HashSet::with_capacity(chapters.len());
        for chapter in &chapters {
            if chapter.course_id() != course_id {
                return Err(OutlineError::ForeignChapter {
                    chapter: chapter.id(),
                    expected: course_id,
                    actual: chapter.course_id(),
                });
            }
            if !ids.insert(chapter.id()) {
                return Err(OutlineError::DuplicateChapter(chapter.id()));
            }
        }

        chapters.sort_by_key(Chapter::order_index);
        if let Some(pair) = chapters
            .windows(2)
            .find(|pair| pair[0].order_index() == pair[1].order_index())
        {
            return Err(OutlineError::DuplicateOrderIndex(pair[0].order_index()));
        }

        Ok(Self {
            course_id,
            chapters,
        })
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// Chapters in ascending `order_index` order.
    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Zero-based rank of a chapter within the outline.
    #[must_use]
    pub fn position(&self, chapter_id: ChapterId) -> Option<usize> {
        self.chapters.iter().position(|c| c.id() == chapter_id)
    }

    #[must_use]
    pub fn contains(&self, chapter_id: ChapterId) -> bool {
        self.position(chapter_id).is_some()
    }

    /// The single prerequisite of a chapter, if it has one.
    #[must_use]
    pub fn predecessor(&self, chapter_id: ChapterId) -> Option<&Chapter> {
        let pos = self.position(chapter_id)?;
        pos.checked_sub(1).map(|prev| &self.chapters[prev])
    }

    /// Whether the learner may open `chapter_id` given what they completed.
    ///
    /// Unknown chapters are never accessible.
    #[must_use]
    pub fn is_accessible(&self, chapter_id: ChapterId, completed: &BTreeSet<ChapterId>) -> bool {
        match self.position(chapter_id) {
            Some(0) => true,
            Some(pos) => completed.contains(&self.chapters[pos - 1].id()),
            None => false,
        }
    }

    /// Number of outline chapters present in `completed`.
    ///
    /// Completions for chapters no longer in the outline are ignored.
    #[must_use]
    pub fn completed_count(&self, completed: &BTreeSet<ChapterId>) -> usize {
        self.chapters
            .iter()
            .filter(|c| completed.contains(&c.id()))
            .count()
    }

    /// True when the outline is non-empty and every chapter is in `completed`.
    #[must_use]
    pub fn is_completed_by(&self, completed: &BTreeSet<ChapterId>) -> bool {
        !self.is_empty() && self.completed_count(completed) == self.len()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
