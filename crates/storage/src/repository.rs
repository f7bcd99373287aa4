use async_trait::async_trait;
use course_core::model::{
    BadgeRecord, ChapterId, CompletionRecord, CourseId, CourseOutline, LearnerId,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read side of the course catalog, plus the authoring hook used to publish
/// an outline.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Fetch a course outline, sorted by `order_index`.
    ///
    /// Returns `Ok(None)` when the course does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn outline(&self, course_id: CourseId) -> Result<Option<CourseOutline>, StorageError>;

    /// Publish (create or replace) a course outline.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the outline cannot be stored.
    async fn put_outline(&self, outline: &CourseOutline) -> Result<(), StorageError>;

    /// List known course ids in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn list_courses(&self) -> Result<Vec<CourseId>, StorageError>;
}

/// Durable chapter completions.
///
/// Writes go through `insert_completion_if_absent` only; an existing record is
/// never updated.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Chapter ids the learner completed in a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn completed_chapters(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<BTreeSet<ChapterId>, StorageError>;

    /// Fetch one completion record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        chapter_id: ChapterId,
    ) -> Result<Option<CompletionRecord>, StorageError>;

    /// Atomically create the record unless its key already exists.
    ///
    /// Returns `true` when this call created the record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails. Implementations may return
    /// `StorageError::Conflict` for a lost race instead of `Ok(false)`.
    async fn insert_completion_if_absent(
        &self,
        record: &CompletionRecord,
    ) -> Result<bool, StorageError>;
}

/// Durable course-completion badges.
#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn has_badge(&self, learner_id: LearnerId, course_id: CourseId)
    -> Result<bool, StorageError>;

    /// Atomically create the badge unless one already exists for the key.
    ///
    /// Returns `true` when this call created the badge.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails. Implementations may return
    /// `StorageError::Conflict` for a lost race instead of `Ok(false)`.
    async fn insert_badge_if_absent(&self, badge: &BadgeRecord) -> Result<bool, StorageError>;

    /// All badges a learner holds, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn badges_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<BadgeRecord>, StorageError>;
}

type CompletionKey = (LearnerId, CourseId, ChapterId);

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Each insert-if-absent runs under a single mutex guard, which makes the
/// existence check and the write one atomic step.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    outlines: Arc<Mutex<HashMap<CourseId, CourseOutline>>>,
    completions: Arc<Mutex<HashMap<CompletionKey, CompletionRecord>>>,
    badges: Arc<Mutex<HashMap<(LearnerId, CourseId), BadgeRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completion records stored for a learner in a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn completion_count(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<usize, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .keys()
            .filter(|(l, c, _)| *l == learner_id && *c == course_id)
            .count())
    }
}

#[async_trait]
impl CourseCatalog for InMemoryRepository {
    async fn outline(&self, course_id: CourseId) -> Result<Option<CourseOutline>, StorageError> {
        let guard = self
            .outlines
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&course_id).cloned())
    }

    async fn put_outline(&self, outline: &CourseOutline) -> Result<(), StorageError> {
        let mut guard = self
            .outlines
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(outline.course_id(), outline.clone());
        Ok(())
    }

    async fn list_courses(&self) -> Result<Vec<CourseId>, StorageError> {
        let guard = self
            .outlines
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut ids: Vec<CourseId> = guard.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn completed_chapters(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<BTreeSet<ChapterId>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .keys()
            .filter(|(l, c, _)| *l == learner_id && *c == course_id)
            .map(|(_, _, chapter)| *chapter)
            .collect())
    }

    async fn completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        chapter_id: ChapterId,
    ) -> Result<Option<CompletionRecord>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(learner_id, course_id, chapter_id)).cloned())
    }

    async fn insert_completion_if_absent(
        &self,
        record: &CompletionRecord,
    ) -> Result<bool, StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (record.learner_id, record.course_id, record.chapter_id);
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, record.clone());
        Ok(true)
    }
}

#[async_trait]
impl BadgeRepository for InMemoryRepository {
    async fn has_badge(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<bool, StorageError> {
        let guard = self
            .badges
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.contains_key(&(learner_id, course_id)))
    }

    async fn insert_badge_if_absent(&self, badge: &BadgeRecord) -> Result<bool, StorageError> {
        let mut guard = self
            .badges
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (badge.learner_id, badge.course_id);
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, badge.clone());
        Ok(true)
    }

    async fn badges_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<BadgeRecord>, StorageError> {
        let guard = self
            .badges
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut badges: Vec<BadgeRecord> = guard
            .values()
            .filter(|b| b.learner_id == learner_id)
            .cloned()
            .collect();
        badges.sort_by_key(|b| (b.earned_at, b.course_id));
        Ok(badges)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CourseCatalog>,
    pub progress: Arc<dyn ProgressRepository>,
    pub badges: Arc<dyn BadgeRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let catalog: Arc<dyn CourseCatalog> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let badges: Arc<dyn BadgeRepository> = Arc::new(repo);
        Self {
            catalog,
            progress,
            badges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use course_core::model::Chapter;
    use course_core::time::fixed_now;

    fn build_outline(course: u64, chapters: u64) -> CourseOutline {
        let course_id = CourseId::new(course);
        let chapters = (1..=chapters)
            .map(|id| {
                Chapter::new(
                    ChapterId::new(id),
                    course_id,
                    format!("Chapter {id}"),
                    u32::try_from(id).unwrap(),
                )
                .unwrap()
            })
            .collect();
        CourseOutline::new(course_id, chapters).unwrap()
    }

    #[tokio::test]
    async fn completion_insert_is_first_write_wins() {
        let repo = InMemoryRepository::new();
        let first = CompletionRecord::new(
            LearnerId::new(1),
            CourseId::new(1),
            ChapterId::new(1),
            fixed_now(),
        );
        let mut second = first.clone();
        second.completed_at = fixed_now() + Duration::hours(1);

        assert!(repo.insert_completion_if_absent(&first).await.unwrap());
        assert!(!repo.insert_completion_if_absent(&second).await.unwrap());

        let stored = repo
            .completion(LearnerId::new(1), CourseId::new(1), ChapterId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.completed_at, fixed_now());
        assert_eq!(
            repo.completion_count(LearnerId::new(1), CourseId::new(1))
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn completed_chapters_are_scoped_to_learner_and_course() {
        let repo = InMemoryRepository::new();
        for (learner, course, chapter) in [(1, 1, 1), (1, 1, 2), (1, 2, 1), (2, 1, 3)] {
            repo.insert_completion_if_absent(&CompletionRecord::new(
                LearnerId::new(learner),
                CourseId::new(course),
                ChapterId::new(chapter),
                fixed_now(),
            ))
            .await
            .unwrap();
        }

        let done = repo
            .completed_chapters(LearnerId::new(1), CourseId::new(1))
            .await
            .unwrap();
        assert_eq!(
            done.into_iter().collect::<Vec<_>>(),
            vec![ChapterId::new(1), ChapterId::new(2)]
        );
    }

    #[tokio::test]
    async fn badge_insert_happens_once() {
        let repo = InMemoryRepository::new();
        let badge = BadgeRecord::new(LearnerId::new(1), CourseId::new(1), fixed_now());

        assert!(!repo.has_badge(LearnerId::new(1), CourseId::new(1)).await.unwrap());
        assert!(repo.insert_badge_if_absent(&badge).await.unwrap());
        assert!(!repo.insert_badge_if_absent(&badge).await.unwrap());
        assert!(repo.has_badge(LearnerId::new(1), CourseId::new(1)).await.unwrap());
        assert_eq!(repo.badges_for_learner(LearnerId::new(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn outlines_round_trip_through_catalog() {
        let repo = InMemoryRepository::new();
        repo.put_outline(&build_outline(2, 3)).await.unwrap();
        repo.put_outline(&build_outline(1, 1)).await.unwrap();

        let outline = repo.outline(CourseId::new(2)).await.unwrap().unwrap();
        assert_eq!(outline.len(), 3);
        assert!(repo.outline(CourseId::new(9)).await.unwrap().is_none());
        assert_eq!(
            repo.list_courses().await.unwrap(),
            vec![CourseId::new(1), CourseId::new(2)]
        );
    }
}
