use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::domain::{CartItem, LessonId, Order, OrderId, OrderStatus};
use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite};
use std::str::FromStr;
use uuid::Uuid;

use crate::{Storage, StorageTx};

impl Storage {
    pub async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection")?;
        let row = sqlx::query(
            "SELECT id, name, phone, status, total, created_at, updated_at
             FROM orders
             WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("failed to load order {id}"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let cart_items = load_order_items(&mut *conn, id).await?;
        order_from_row(&row, cart_items).map(Some)
    }
}

impl StorageTx {
    pub async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, name, phone, status, total, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.id.to_string())
        .bind(&order.name)
        .bind(&order.phone)
        .bind(order.status.as_str())
        .bind(order.total.to_string())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("failed to insert order {}", order.id))?;

        for (position, item) in order.cart_items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, lesson_id, count) VALUES (?, ?, ?, ?)",
            )
            .bind(order.id.to_string())
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(item.lesson_id.as_str())
            .bind(i64::from(item.count))
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("failed to insert cart item for order {}", order.id))?;
        }
        Ok(())
    }

    /// Stamps the order's `updated_at` and returns its current status, or
    /// `None` when the id does not resolve. Being a write, it takes the
    /// database write lock for the rest of the transaction.
    pub async fn claim_order(
        &mut self,
        id: OrderId,
        at: DateTime<Utc>,
    ) -> Result<Option<OrderStatus>> {
        let row = sqlx::query("UPDATE orders SET updated_at = ? WHERE id = ? RETURNING status")
            .bind(at)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("failed to claim order {id}"))?;
        row.map(|r| parse_status(&r.try_get::<String, _>("status")?))
            .transpose()
    }

    /// `pending -> confirmed`. Returns 0 when the order is missing or no
    /// longer pending.
    pub async fn mark_order_confirmed(&mut self, id: OrderId, at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(OrderStatus::Confirmed.as_str())
        .bind(at)
        .bind(id.to_string())
        .bind(OrderStatus::Pending.as_str())
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("failed to confirm order {id}"))?;
        Ok(result.rows_affected())
    }
}

async fn load_order_items<'c, E>(executor: E, id: OrderId) -> Result<Vec<CartItem>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT lesson_id, count FROM order_items WHERE order_id = ? ORDER BY position",
    )
    .bind(id.to_string())
    .fetch_all(executor)
    .await
    .with_context(|| format!("failed to load cart items for order {id}"))?;

    rows.iter()
        .map(|r| -> Result<CartItem> {
            let count = u32::try_from(r.try_get::<i64, _>("count")?)
                .with_context(|| format!("order {id} has out of range item count"))?;
            Ok(CartItem {
                lesson_id: LessonId(r.try_get("lesson_id")?),
                count,
            })
        })
        .collect()
}

fn order_from_row(row: &SqliteRow, cart_items: Vec<CartItem>) -> Result<Order> {
    let raw_id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&raw_id).with_context(|| format!("malformed order id '{raw_id}'"))?;
    let raw_total: String = row.try_get("total")?;
    let total = Decimal::from_str(&raw_total)
        .with_context(|| format!("order {raw_id} has malformed total '{raw_total}'"))?;

    Ok(Order {
        id: OrderId(id),
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        cart_items,
        status: parse_status(&row.try_get::<String, _>("status")?)?,
        total,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    OrderStatus::from_db(raw).ok_or_else(|| anyhow!("unknown order status '{raw}'"))
}
