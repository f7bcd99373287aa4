use std::collections::BTreeSet;
use std::sync::Arc;

use course_core::model::{BadgeRecord, ChapterId, CourseOutline, LearnerId};
use storage::repository::{BadgeRepository, StorageError};
use tracing::{debug, info};

use crate::Clock;
use crate::error::ProgressError;

/// Decides and performs exactly-once course badge issuance.
///
/// Completeness is always re-derived from the full completed set, so a call
/// after a failed or lost evaluation converges on the same answer.
#[derive(Clone)]
pub struct BadgeEvaluator {
    clock: Clock,
    badges: Arc<dyn BadgeRepository>,
}

impl BadgeEvaluator {
    #[must_use]
    pub fn new(clock: Clock, badges: Arc<dyn BadgeRepository>) -> Self {
        Self { clock, badges }
    }

    /// Issue the course badge if `completed` covers the whole outline and no
    /// badge exists yet.
    ///
    /// Returns `true` only when this call created the badge. An empty outline
    /// never earns one.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::StoreUnavailable` if the badge store fails. A
    /// uniqueness conflict is not an error.
    pub async fn evaluate(
        &self,
        learner_id: LearnerId,
        outline: &CourseOutline,
        completed: &BTreeSet<ChapterId>,
    ) -> Result<bool, ProgressError> {
        let course_id = outline.course_id();
        if !outline.is_completed_by(completed) {
            return Ok(false);
        }

        if self.badges.has_badge(learner_id, course_id).await? {
            debug!(%learner_id, %course_id, "badge already awarded");
            return Ok(false);
        }

        let badge = BadgeRecord::new(learner_id, course_id, self.clock.now());
        match self.badges.insert_badge_if_absent(&badge).await {
            Ok(true) => {
                info!(%learner_id, %course_id, "course badge issued");
                Ok(true)
            }
            Ok(false) | Err(StorageError::Conflict) => {
                debug!(%learner_id, %course_id, "badge issued by a concurrent evaluator");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}
