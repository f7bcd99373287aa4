use std::collections::BTreeSet;

use course_core::model::{ChapterId, CompletionRecord, CourseId, LearnerId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{chapter_id_from_i64, conn, id_i64, map_completion_row, ser};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn completed_chapters(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<BTreeSet<ChapterId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT chapter_id
                FROM chapter_completions
                WHERE learner_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = BTreeSet::new();
        for row in rows {
            out.insert(chapter_id_from_i64(
                row.try_get::<i64, _>("chapter_id").map_err(ser)?,
            )?);
        }
        Ok(out)
    }

    async fn completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        chapter_id: ChapterId,
    ) -> Result<Option<CompletionRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT learner_id, course_id, chapter_id, completed_at
                FROM chapter_completions
                WHERE learner_id = ?1 AND course_id = ?2 AND chapter_id = ?3
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .bind(id_i64("chapter_id", chapter_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_completion_row).transpose()
    }

    async fn insert_completion_if_absent(
        &self,
        record: &CompletionRecord,
    ) -> Result<bool, StorageError> {
        // DO NOTHING keeps the first completed_at.
        let res = sqlx::query(
            r"
                INSERT INTO chapter_completions (learner_id, course_id, chapter_id, completed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(learner_id, course_id, chapter_id) DO NOTHING
            ",
        )
        .bind(id_i64("learner_id", record.learner_id.value())?)
        .bind(id_i64("course_id", record.course_id.value())?)
        .bind(id_i64("chapter_id", record.chapter_id.value())?)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }
}
