use chrono::Utc;
use shared::{
    domain::{Order, OrderId, OrderStatus},
    protocol::{ReduceSpacesResponse, ReducedLesson},
};
use tracing::{info, warn};

use crate::{
    demand::{missing_ids, order_total, Demand},
    error::BookingError,
    validation::{Cart, OrderDraft},
    Reconciler,
};

impl Reconciler {
    /// Records a pending order after checking every cart line against a
    /// point-in-time read of the lessons.
    ///
    /// Nothing is reserved here. Between this check and
    /// [`Reconciler::confirm_order`] other orders can take the same seats, so
    /// a created order may still fail to confirm. Confirmation re-checks
    /// capacity inside its own transaction.
    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, BookingError> {
        let demand = Demand::of(draft.cart().items());
        let lesson_ids = demand.lesson_ids();
        let lessons = self.storage.lessons_by_ids(&lesson_ids).await?;

        let missing = missing_ids(&lesson_ids, &lessons);
        if !missing.is_empty() {
            let missing: Vec<&str> = missing.iter().map(|id| id.as_str()).collect();
            return Err(BookingError::Validation(format!(
                "Some lesson IDs do not exist: {}",
                missing.join(", ")
            )));
        }
        demand.ensure_available(&lessons)?;

        let total = order_total(draft.cart().items(), &lessons)?;

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            name: draft.name().to_string(),
            phone: draft.phone().to_string(),
            cart_items: draft.cart().items().to_vec(),
            status: OrderStatus::Pending,
            total,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.storage.begin().await?;
        tx.insert_order(&order).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            total = %order.total,
            lines = order.cart_items.len(),
            "order created"
        );
        Ok(order)
    }

    /// Reserves the order's seats and marks it confirmed, as one transaction.
    ///
    /// The seats reserved are those named by `cart`, summed per lesson. On any
    /// failure the transaction is dropped, so no lesson loses space and the
    /// order stays pending.
    pub async fn confirm_order(
        &self,
        order_id: OrderId,
        cart: &Cart,
    ) -> Result<ReduceSpacesResponse, BookingError> {
        let now = Utc::now();
        let mut tx = self.storage.begin().await?;

        // First statement is a write: the transaction holds the write lock
        // before any capacity is read.
        match tx.claim_order(order_id, now).await? {
            None => return Err(BookingError::OrderNotFound(order_id)),
            Some(OrderStatus::Confirmed) => return Err(BookingError::AlreadyProcessed(order_id)),
            Some(OrderStatus::Pending) => {}
        }

        let requested = Demand::of(cart.items());
        let lesson_ids = requested.lesson_ids();
        let lessons = tx.lessons_by_ids(&lesson_ids).await?;
        let missing = missing_ids(&lesson_ids, &lessons);
        if !missing.is_empty() {
            return Err(BookingError::LessonsNotFound(missing));
        }
        if let Err(err) = requested.ensure_available(&lessons) {
            warn!(%order_id, error = %err, "order confirmation rejected");
            return Err(err);
        }

        for (lesson_id, seats) in requested.lines() {
            if tx.decrement_space(lesson_id, seats, now).await? == 0 {
                return Err(BookingError::UpdateFailed(format!(
                    "space for lesson {lesson_id} changed during confirmation"
                )));
            }
        }
        if tx.mark_order_confirmed(order_id, now).await? == 0 {
            return Err(BookingError::UpdateFailed(format!(
                "order {order_id} changed during confirmation"
            )));
        }
        tx.commit().await?;

        let updated_lessons: Vec<ReducedLesson> = requested
            .lines()
            .map(|(id, seats)| ReducedLesson {
                id: id.clone(),
                reduced_by: seats,
            })
            .collect();
        info!(%order_id, lessons = updated_lessons.len(), "order confirmed");

        Ok(ReduceSpacesResponse {
            message: "Lesson spaces reduced successfully and order confirmed".into(),
            order_id,
            updated_lessons,
            status: OrderStatus::Confirmed,
        })
    }

    pub async fn order(&self, order_id: OrderId) -> Result<Order, BookingError> {
        self.storage
            .order_by_id(order_id)
            .await?
            .ok_or(BookingError::OrderNotFound(order_id))
    }
}
