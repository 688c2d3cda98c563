use std::collections::BTreeSet;

use chrono::Utc;
use shared::{
    domain::{Lesson, LessonId},
    protocol::{AppliedChanges, UpdateFieldsResponse},
};
use tracing::{debug, info};

use crate::{demand::missing_ids, error::BookingError, validation::LessonUpdate, Reconciler};

impl Reconciler {
    pub async fn list_lessons(&self) -> Result<Vec<Lesson>, BookingError> {
        Ok(self.storage.list_lessons().await?)
    }

    /// Applies every change set or none of them.
    ///
    /// All referenced lessons must exist; otherwise the error lists every
    /// missing id and nothing is written.
    pub async fn patch_lessons(
        &self,
        updates: &[LessonUpdate],
    ) -> Result<UpdateFieldsResponse, BookingError> {
        if updates.is_empty() {
            return Err(BookingError::Validation(
                "updates must be a non-empty array".into(),
            ));
        }

        let lesson_ids: Vec<LessonId> = updates
            .iter()
            .map(|update| update.lesson_id().clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let now = Utc::now();
        let mut tx = self.storage.begin().await?;

        // Stamping first takes the write lock, so no capacity decrement can
        // interleave with the existence check and the merges below.
        let stamped = tx.stamp_lessons(&lesson_ids, now).await?;
        debug!(stamped, requested = lesson_ids.len(), "lessons stamped for update");

        let found = tx.lessons_by_ids(&lesson_ids).await?;
        let missing = missing_ids(&lesson_ids, &found);
        if !missing.is_empty() {
            return Err(BookingError::LessonsNotFound(missing));
        }

        for update in updates {
            let changed = tx
                .apply_lesson_changes(update.lesson_id(), update.changes(), now)
                .await?;
            if changed == 0 {
                return Err(BookingError::UpdateFailed(format!(
                    "Update for lesson {} did not apply",
                    update.lesson_id()
                )));
            }
        }
        tx.commit().await?;

        info!(count = updates.len(), "lesson fields updated");
        Ok(UpdateFieldsResponse {
            message: "Lesson fields updated successfully".into(),
            updated_count: updates.len(),
            updated_lessons: updates
                .iter()
                .map(|update| AppliedChanges {
                    id: update.lesson_id().clone(),
                    changes: update.changes().clone(),
                })
                .collect(),
            status: "success".into(),
        })
    }
}
