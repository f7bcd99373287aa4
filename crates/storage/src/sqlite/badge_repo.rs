use course_core::model::{BadgeRecord, CourseId, LearnerId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_badge_row};
use crate::repository::{BadgeRepository, StorageError};

#[async_trait::async_trait]
impl BadgeRepository for SqliteRepository {
    async fn has_badge(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 FROM course_badges WHERE learner_id = ?1 AND course_id = ?2",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        Ok(row.is_some())
    }

    async fn insert_badge_if_absent(&self, badge: &BadgeRecord) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO course_badges (learner_id, course_id, earned_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(learner_id, course_id) DO NOTHING
            ",
        )
        .bind(id_i64("learner_id", badge.learner_id.value())?)
        .bind(id_i64("course_id", badge.course_id.value())?)
        .bind(badge.earned_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }

    async fn badges_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<BadgeRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT learner_id, course_id, earned_at
                FROM course_badges
                WHERE learner_id = ?1
                ORDER BY earned_at ASC, course_id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_badge_row(&row)?);
        }
        Ok(out)
    }
}
