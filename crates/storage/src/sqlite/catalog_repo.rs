use chrono::Utc;
use course_core::model::{CourseId, CourseOutline};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, course_id_from_i64, id_i64, map_chapter_row, ser};
use crate::repository::{CourseCatalog, StorageError};

#[async_trait::async_trait]
impl CourseCatalog for SqliteRepository {
    async fn outline(&self, course_id: CourseId) -> Result<Option<CourseOutline>, StorageError> {
        let course = id_i64("course_id", course_id.value())?;

        let exists = sqlx::query("SELECT 1 FROM courses WHERE id = ?1")
            .bind(course)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            r"
                SELECT id, course_id, title, order_index, is_required
                FROM chapters
                WHERE course_id = ?1
                ORDER BY order_index ASC
            ",
        )
        .bind(course)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut chapters = Vec::with_capacity(rows.len());
        for row in rows {
            chapters.push(map_chapter_row(&row)?);
        }

        CourseOutline::new(course_id, chapters).map(Some).map_err(ser)
    }

    async fn put_outline(&self, outline: &CourseOutline) -> Result<(), StorageError> {
        let course = id_i64("course_id", outline.course_id().value())?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO courses (id, published_at)
                VALUES (?1, ?2)
                ON CONFLICT(id) DO UPDATE SET published_at = excluded.published_at
            ",
        )
        .bind(course)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM chapters WHERE course_id = ?1")
            .bind(course)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for chapter in outline.chapters() {
            sqlx::query(
                r"
                    INSERT INTO chapters (id, course_id, title, order_index, is_required)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(id_i64("chapter_id", chapter.id().value())?)
            .bind(course)
            .bind(chapter.title())
            .bind(i64::from(chapter.order_index()))
            .bind(i64::from(chapter.is_required()))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn list_courses(&self) -> Result<Vec<CourseId>, StorageError> {
        let rows = sqlx::query("SELECT id FROM courses ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(course_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?);
        }
        Ok(ids)
    }
}
