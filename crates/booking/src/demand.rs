use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;
use shared::domain::{CartItem, Lesson, LessonId};

use crate::error::BookingError;

/// Seats requested per lesson, summed across cart lines that name the same
/// lesson. Iteration is ordered by lesson id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Demand(BTreeMap<LessonId, u32>);

impl Demand {
    pub(crate) fn of(items: &[CartItem]) -> Self {
        let mut seats = BTreeMap::new();
        for item in items {
            let entry = seats.entry(item.lesson_id.clone()).or_insert(0u32);
            *entry = entry.saturating_add(item.count);
        }
        Self(seats)
    }

    pub(crate) fn lesson_ids(&self) -> Vec<LessonId> {
        self.0.keys().cloned().collect()
    }

    pub(crate) fn lines(&self) -> impl Iterator<Item = (&LessonId, u32)> + '_ {
        self.0.iter().map(|(id, seats)| (id, *seats))
    }

    /// Fails on the first lesson (by id) whose space is below the demand.
    /// Lessons missing from `lessons` are ignored; callers check those first.
    pub(crate) fn ensure_available(&self, lessons: &[Lesson]) -> Result<(), BookingError> {
        let by_id = index(lessons);
        for (lesson_id, requested) in self.lines() {
            let Some(lesson) = by_id.get(lesson_id) else {
                continue;
            };
            if lesson.space < requested {
                return Err(BookingError::InsufficientCapacity {
                    lesson_id: lesson_id.clone(),
                    available: lesson.space,
                    requested,
                });
            }
        }
        Ok(())
    }
}

/// Requested ids with no matching lesson, in request order.
pub(crate) fn missing_ids(requested: &[LessonId], found: &[Lesson]) -> Vec<LessonId> {
    let found: BTreeSet<&LessonId> = found.iter().map(|lesson| &lesson.id).collect();
    let mut seen = BTreeSet::new();
    requested
        .iter()
        .filter(|id| !found.contains(id) && seen.insert(*id))
        .cloned()
        .collect()
}

/// `Σ price × count` over the cart as submitted. Fails instead of panicking
/// when the sum leaves `Decimal`'s range.
pub(crate) fn order_total(
    items: &[CartItem],
    lessons: &[Lesson],
) -> Result<Decimal, BookingError> {
    let by_id = index(lessons);
    items
        .iter()
        .filter_map(|item| by_id.get(&item.lesson_id).map(|lesson| (lesson, item.count)))
        .try_fold(Decimal::ZERO, |total, (lesson, count)| {
            lesson
                .price
                .checked_mul(Decimal::from(count))
                .and_then(|line| total.checked_add(line))
        })
        .ok_or_else(|| BookingError::Validation("order total out of range".into()))
}

fn index(lessons: &[Lesson]) -> HashMap<&LessonId, &Lesson> {
    lessons.iter().map(|lesson| (&lesson.id, lesson)).collect()
}
