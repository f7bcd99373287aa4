use std::collections::BTreeSet;
use std::sync::Arc;

use course_core::model::{ChapterId, CourseId, CourseOutline};
use storage::repository::CourseCatalog;

use crate::error::ProgressError;

/// Read-only view of course chapter ordering.
#[derive(Clone)]
pub struct CourseGraph {
    catalog: Arc<dyn CourseCatalog>,
}

impl CourseGraph {
    #[must_use]
    pub fn new(catalog: Arc<dyn CourseCatalog>) -> Self {
        Self { catalog }
    }

    /// Resolve the ordered chapters of a course.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` for an unknown course and
    /// `ProgressError::StoreUnavailable` if the catalog cannot be read.
    pub async fn outline(&self, course_id: CourseId) -> Result<CourseOutline, ProgressError> {
        self.catalog
            .outline(course_id)
            .await?
            .ok_or(ProgressError::CourseNotFound(course_id))
    }

    /// Strict linear prerequisite check: the first chapter is always open,
    /// any other chapter needs its immediate predecessor completed.
    #[must_use]
    pub fn is_accessible(
        outline: &CourseOutline,
        chapter_id: ChapterId,
        completed: &BTreeSet<ChapterId>,
    ) -> bool {
        outline.is_accessible(chapter_id, completed)
    }
}
