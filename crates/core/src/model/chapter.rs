use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ChapterId, CourseId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChapterError {
    #[error("chapter title cannot be empty")]
    EmptyTitle,

    #[error("chapter order index must be > 0")]
    InvalidOrderIndex,
}

/// A single unit of a course, as published by the catalog.
///
/// Chapters are read-only to the progression engine. `order_index` defines the
/// total order within a course; gaps between indices carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    id: ChapterId,
    course_id: CourseId,
    title: String,
    order_index: u32,
    is_required: bool,
}

impl Chapter {
    /// Creates a required chapter.
    ///
    /// # Errors
    ///
    /// Returns `ChapterError::EmptyTitle` for a blank title and
    /// `ChapterError::InvalidOrderIndex` when `order_index` is zero.
    pub fn new(
        id: ChapterId,
        course_id: CourseId,
        title: impl Into<String>,
        order_index: u32,
    ) -> Result<Self, ChapterError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ChapterError::EmptyTitle);
        }
        if order_index == 0 {
            return Err(ChapterError::InvalidOrderIndex);
        }
        Ok(Self {
            id,
            course_id,
            title,
            order_index,
            is_required: true,
        })
    }

    /// Sets the `is_required` flag.
    ///
    /// The flag is stored and round-tripped but every chapter still counts
    /// toward completion.
    #[must_use]
    pub fn with_required(mut self, is_required: bool) -> Self {
        self.is_required = is_required;
        self
    }

    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.is_required
    }
}
