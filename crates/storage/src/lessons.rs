use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::domain::{Lesson, LessonChanges, LessonId, NewLesson};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use std::str::FromStr;

use crate::{Storage, StorageTx};

const LESSON_COLUMNS: &str = "id, topic, location, price, space, image, description, updated_at";

impl Storage {
    /// Inserts a lesson or, when the external id is already present, replaces
    /// its fields. Used by seeding only.
    pub async fn insert_lesson(&self, lesson: &NewLesson) -> Result<Lesson> {
        let row = sqlx::query(&format!(
            "INSERT INTO lessons (id, topic, location, price, space, image, description, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                topic = excluded.topic,
                location = excluded.location,
                price = excluded.price,
                space = excluded.space,
                image = excluded.image,
                description = excluded.description,
                updated_at = excluded.updated_at
             RETURNING {LESSON_COLUMNS}"
        ))
        .bind(lesson.id.as_str())
        .bind(&lesson.topic)
        .bind(&lesson.location)
        .bind(lesson.price.to_string())
        .bind(i64::from(lesson.space))
        .bind(lesson.image.as_deref())
        .bind(lesson.description.as_deref())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to upsert lesson {}", lesson.id))?;
        lesson_from_row(&row)
    }

    pub async fn list_lessons(&self) -> Result<Vec<Lesson>> {
        let rows = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .context("failed to list lessons")?;
        rows.iter().map(lesson_from_row).collect()
    }

    pub async fn lesson_by_id(&self, id: &LessonId) -> Result<Option<Lesson>> {
        let row = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load lesson {id}"))?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    /// Point-in-time batch read; ids that do not resolve are simply absent
    /// from the result.
    pub async fn lessons_by_ids(&self, ids: &[LessonId]) -> Result<Vec<Lesson>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = select_lessons_in(ids);
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("failed to load lessons by id")?;
        rows.iter().map(lesson_from_row).collect()
    }
}

impl StorageTx {
    pub async fn lessons_by_ids(&mut self, ids: &[LessonId]) -> Result<Vec<Lesson>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = select_lessons_in(ids);
        let rows = builder
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .context("failed to load lessons by id")?;
        rows.iter().map(lesson_from_row).collect()
    }

    /// Sets `updated_at` on every listed lesson and returns how many rows
    /// matched. Being a write, it takes the database write lock for the rest
    /// of the transaction.
    pub async fn stamp_lessons(&mut self, ids: &[LessonId], at: DateTime<Utc>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE lessons SET updated_at = ");
        builder.push_bind(at);
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");
        let result = builder
            .build()
            .execute(&mut *self.tx)
            .await
            .context("failed to stamp lessons")?;
        Ok(result.rows_affected())
    }

    pub async fn apply_lesson_changes(
        &mut self,
        id: &LessonId,
        changes: &LessonChanges,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE lessons SET updated_at = ");
        builder.push_bind(at);
        if let Some(topic) = &changes.topic {
            builder.push(", topic = ").push_bind(topic.as_str());
        }
        if let Some(location) = &changes.location {
            builder.push(", location = ").push_bind(location.as_str());
        }
        if let Some(price) = changes.price {
            builder.push(", price = ").push_bind(price.to_string());
        }
        if let Some(image) = &changes.image {
            builder.push(", image = ").push_bind(image.as_str());
        }
        if let Some(description) = &changes.description {
            builder.push(", description = ").push_bind(description.as_str());
        }
        builder.push(" WHERE id = ").push_bind(id.as_str());

        let result = builder
            .build()
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("failed to update lesson {id}"))?;
        Ok(result.rows_affected())
    }

    /// Relative decrement guarded by `space >= count`. Returns 0 when the
    /// lesson is missing or the guard rejects the write.
    pub async fn decrement_space(
        &mut self,
        id: &LessonId,
        count: u32,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE lessons
             SET space = space - ?1, updated_at = ?2
             WHERE id = ?3 AND space >= ?1",
        )
        .bind(i64::from(count))
        .bind(at)
        .bind(id.as_str())
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("failed to reduce space for lesson {id}"))?;
        Ok(result.rows_affected())
    }
}

fn select_lessons_in(ids: &[LessonId]) -> QueryBuilder<'_, Sqlite> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE id IN ("
    ));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(") ORDER BY id");
    builder
}

fn lesson_from_row(row: &SqliteRow) -> Result<Lesson> {
    let id: String = row.try_get("id")?;
    let raw_price: String = row.try_get("price")?;
    let price = Decimal::from_str(&raw_price)
        .with_context(|| format!("lesson {id} has malformed price '{raw_price}'"))?;
    let space = u32::try_from(row.try_get::<i64, _>("space")?)
        .with_context(|| format!("lesson {id} has out of range space"))?;

    Ok(Lesson {
        topic: row.try_get("topic")?,
        location: row.try_get("location")?,
        price,
        space,
        image: row.try_get("image")?,
        description: row.try_get("description")?,
        updated_at: row.try_get("updated_at")?,
        id: LessonId(id),
    })
}
