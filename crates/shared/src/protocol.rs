use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{LessonChanges, LessonId, Order, OrderId, OrderStatus};

/// Cart line as received on the wire, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub count: i64,
}

impl CartItemPayload {
    pub fn new(id: impl Into<String>, count: i64) -> Self {
        Self {
            id: id.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub cart_items: Vec<CartItemPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub message: String,
    pub order_id: OrderId,
    pub order: Order,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldUpdatePayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Map<String, Value>,
}

/// Body of `PUT /api/lessons/update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum LessonUpdateRequest {
    ReduceSpaces {
        #[serde(rename = "orderId", default)]
        order_id: String,
        #[serde(rename = "cartItems", default)]
        cart_items: Vec<CartItemPayload>,
    },
    UpdateFields {
        #[serde(default)]
        updates: Vec<FieldUpdatePayload>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReducedLesson {
    pub id: LessonId,
    pub reduced_by: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceSpacesResponse {
    pub message: String,
    pub order_id: OrderId,
    pub updated_lessons: Vec<ReducedLesson>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChanges {
    pub id: LessonId,
    pub changes: LessonChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFieldsResponse {
    pub message: String,
    pub updated_count: usize,
    pub updated_lessons: Vec<AppliedChanges>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LessonUpdateResponse {
    ReduceSpaces(ReduceSpacesResponse),
    UpdateFields(UpdateFieldsResponse),
}

/// Payload returned for unknown routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteNotFound {
    pub success: bool,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}
