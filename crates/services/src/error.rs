//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{ChapterId, CourseId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the progression engine.
///
/// `StorageError::Conflict` never reaches this type: a lost insert race is
/// folded into the idempotent success path before errors are converted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),

    #[error("chapter {chapter} not found in course {course}")]
    ChapterNotFound { course: CourseId, chapter: ChapterId },

    #[error("chapter {chapter} is locked until chapter {prerequisite} is completed")]
    PrerequisiteNotMet {
        chapter: ChapterId,
        prerequisite: ChapterId,
    },

    #[error("progress store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),
}

impl ProgressError {
    /// Course or chapter unknown to the catalog.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProgressError::CourseNotFound(_) | ProgressError::ChapterNotFound { .. }
        )
    }

    /// Transient store failures. Every write is insert-if-absent, so repeating
    /// the whole call is safe.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProgressError::StoreUnavailable(_))
    }
}

impl From<StorageError> for ProgressError {
    fn from(err: StorageError) -> Self {
        ProgressError::StoreUnavailable(err)
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_failures_are_retryable() {
        let transient = ProgressError::from(StorageError::Connection("down".into()));
        assert!(transient.is_retryable());
        assert!(!transient.is_not_found());

        let locked = ProgressError::PrerequisiteNotMet {
            chapter: ChapterId::new(2),
            prerequisite: ChapterId::new(1),
        };
        assert!(!locked.is_retryable());
        assert_eq!(
            locked.to_string(),
            "chapter 2 is locked until chapter 1 is completed"
        );

        assert!(ProgressError::CourseNotFound(CourseId::new(3)).is_not_found());
    }
}
