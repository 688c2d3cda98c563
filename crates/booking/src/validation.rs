//! Shape validation for inbound payloads.
//!
//! Each parser collects every problem it finds and reports them together in a
//! single [`BookingError::Validation`], so a client can fix a request in one
//! round trip.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use shared::{
    domain::{max_lesson_price, CartItem, LessonChanges, LessonId, OrderId},
    protocol::{CartItemPayload, CreateOrderRequest, FieldUpdatePayload},
};

use crate::error::BookingError;

/// Fields a change set may never touch. `space` belongs to the reconciler.
const PROTECTED_FIELDS: [&str; 5] = ["id", "_id", "space", "updatedAt", "updated_at"];

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Non-empty cart whose lines all name a lesson and request at least one seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart(Vec<CartItem>);

impl Cart {
    pub fn parse(items: &[CartItemPayload]) -> Result<Self, BookingError> {
        let mut problems = Vec::new();
        let cart = parse_cart_items(items, &mut problems);
        finish(problems)?;
        Ok(cart)
    }

    pub fn new(items: Vec<CartItem>) -> Result<Self, BookingError> {
        let payloads: Vec<CartItemPayload> = items
            .iter()
            .map(|item| CartItemPayload::new(item.lesson_id.as_str(), i64::from(item.count)))
            .collect();
        Self::parse(&payloads)
    }

    pub fn items(&self) -> &[CartItem] {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct OrderDraft {
    name: String,
    phone: String,
    cart: Cart,
}

impl OrderDraft {
    pub fn parse(request: &CreateOrderRequest) -> Result<Self, BookingError> {
        let mut problems = Vec::new();

        let name = request.name.trim();
        if name.is_empty() {
            problems.push("name is required".to_string());
        }
        let phone = request.phone.trim();
        if !is_valid_phone(phone) {
            problems.push("a valid phone number is required".to_string());
        }
        let cart = parse_cart_items(&request.cart_items, &mut problems);

        finish(problems)?;
        Ok(Self {
            name: name.to_string(),
            phone: phone.to_string(),
            cart,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }
}

/// A non-empty change set aimed at one lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonUpdate {
    lesson_id: LessonId,
    changes: LessonChanges,
}

impl LessonUpdate {
    pub fn new(lesson_id: LessonId, changes: LessonChanges) -> Result<Self, BookingError> {
        let mut problems = Vec::new();
        check_update(0, &lesson_id, &changes, &mut problems);
        finish(problems)?;
        Ok(Self { lesson_id, changes })
    }

    pub fn parse_batch(updates: &[FieldUpdatePayload]) -> Result<Vec<Self>, BookingError> {
        let mut problems = Vec::new();
        if updates.is_empty() {
            problems.push("updates must be a non-empty array".to_string());
        }

        let mut parsed = Vec::with_capacity(updates.len());
        for (index, update) in updates.iter().enumerate() {
            let lesson_id = LessonId::new(update.id.trim());
            let Some(changes) = parse_changes(index, &update.changes, &mut problems) else {
                continue;
            };
            check_update(index, &lesson_id, &changes, &mut problems);
            parsed.push(Self { lesson_id, changes });
        }

        finish(problems)?;
        Ok(parsed)
    }

    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    pub fn changes(&self) -> &LessonChanges {
        &self.changes
    }
}

pub fn parse_order_id(raw: &str) -> Result<OrderId, BookingError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(BookingError::Validation("orderId is required".into()));
    }
    raw.parse()
        .map_err(|_| BookingError::Validation(format!("orderId '{raw}' is not a valid order id")))
}

fn parse_cart_items(items: &[CartItemPayload], problems: &mut Vec<String>) -> Cart {
    if items.is_empty() {
        problems.push("cartItems must be a non-empty array".to_string());
    }

    let mut cart = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let id = item.id.trim();
        if id.is_empty() {
            problems.push(format!("cartItems[{index}].id is required"));
        }
        if item.count < 1 {
            problems.push(format!("cartItems[{index}].count must be at least 1"));
            continue;
        }
        let Ok(count) = u32::try_from(item.count) else {
            problems.push(format!("cartItems[{index}].count is too large"));
            continue;
        };
        cart.push(CartItem {
            lesson_id: LessonId::new(id),
            count,
        });
    }
    Cart(cart)
}

fn parse_changes(
    index: usize,
    raw: &Map<String, Value>,
    problems: &mut Vec<String>,
) -> Option<LessonChanges> {
    let mut protected = false;
    for key in raw.keys() {
        if PROTECTED_FIELDS.contains(&key.as_str()) {
            problems.push(format!("updates[{index}].changes.{key} cannot be patched"));
            protected = true;
        }
    }
    if protected {
        return None;
    }

    match serde_json::from_value::<LessonChanges>(Value::Object(raw.clone())) {
        Ok(changes) => Some(changes),
        Err(err) => {
            problems.push(format!("updates[{index}].changes: {err}"));
            None
        }
    }
}

fn check_update(
    index: usize,
    lesson_id: &LessonId,
    changes: &LessonChanges,
    problems: &mut Vec<String>,
) {
    if lesson_id.as_str().trim().is_empty() {
        problems.push(format!("updates[{index}].id is required"));
    }
    if changes.is_empty() {
        problems.push(format!("updates[{index}].changes must not be empty"));
    }
    if changes.price.is_some_and(|price| price < Decimal::ZERO) {
        problems.push(format!("updates[{index}].changes.price must not be negative"));
    }
    if changes.price.is_some_and(|price| price > max_lesson_price()) {
        problems.push(format!(
            "updates[{index}].changes.price must not exceed {}",
            max_lesson_price()
        ));
    }
    if changes.topic.as_deref().is_some_and(|t| t.trim().is_empty()) {
        problems.push(format!("updates[{index}].changes.topic must not be blank"));
    }
    if changes
        .location
        .as_deref()
        .is_some_and(|l| l.trim().is_empty())
    {
        problems.push(format!("updates[{index}].changes.location must not be blank"));
    }
}

/// Accepts an optional leading `+`, then 7 to 15 digits. Spaces, dashes and
/// parentheses are ignored as separators.
fn is_valid_phone(raw: &str) -> bool {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    let mut count = 0;
    for ch in digits.chars() {
        match ch {
            '0'..='9' => count += 1,
            ' ' | '-' | '(' | ')' => {}
            _ => return false,
        }
    }
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&count)
}

fn finish(problems: Vec<String>) -> Result<(), BookingError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(BookingError::Validation(problems.join("; ")))
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
