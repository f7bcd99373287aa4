use course_core::model::{
    BadgeRecord, Chapter, ChapterId, CompletionRecord, CourseId, LearnerId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn chapter_id_from_i64(v: i64) -> Result<ChapterId, StorageError> {
    Ok(ChapterId::new(i64_to_u64("chapter_id", v)?))
}

pub(crate) fn map_chapter_row(row: &SqliteRow) -> Result<Chapter, StorageError> {
    let order_index_i64: i64 = row.try_get("order_index").map_err(ser)?;
    let order_index = u32::try_from(order_index_i64).map_err(|_| {
        StorageError::Serialization(format!("invalid order_index: {order_index_i64}"))
    })?;

    let chapter = Chapter::new(
        chapter_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        order_index,
    )
    .map_err(ser)?;

    Ok(chapter.with_required(row.try_get::<i64, _>("is_required").map_err(ser)? != 0))
}

pub(crate) fn map_completion_row(row: &SqliteRow) -> Result<CompletionRecord, StorageError> {
    Ok(CompletionRecord::new(
        learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        chapter_id_from_i64(row.try_get::<i64, _>("chapter_id").map_err(ser)?)?,
        row.try_get("completed_at").map_err(ser)?,
    ))
}

pub(crate) fn map_badge_row(row: &SqliteRow) -> Result<BadgeRecord, StorageError> {
    Ok(BadgeRecord::new(
        learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        row.try_get("earned_at").map_err(ser)?,
    ))
}
