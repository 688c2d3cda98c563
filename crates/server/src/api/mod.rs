use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{StatusCode, Uri},
    response::Html,
    Json,
};
use booking::{parse_order_id, BookingError, Cart, LessonUpdate, OrderDraft};
use chrono::Utc;
use shared::{
    domain::{Lesson, Order},
    error::ApiError,
    protocol::{
        CreateOrderRequest, CreateOrderResponse, LessonUpdateRequest, LessonUpdateResponse,
        RouteNotFound,
    },
};
use tracing::{error, warn};

use crate::app_state::AppState;

pub(crate) type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub(crate) async fn list_lessons(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Lesson>>> {
    let lessons = state
        .reconciler
        .list_lessons()
        .await
        .map_err(booking_error)?;
    Ok(Json(lessons))
}

pub(crate) async fn create_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateOrderResponse>)> {
    let Json(req) = payload.map_err(malformed_body)?;
    let draft = OrderDraft::parse(&req).map_err(booking_error)?;
    let order = state
        .reconciler
        .create_order(draft)
        .await
        .map_err(booking_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            message: "Order created successfully".into(),
            order_id: order.id,
            order,
        }),
    ))
}

pub(crate) async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order_id = parse_order_id(&order_id).map_err(booking_error)?;
    let order = state
        .reconciler
        .order(order_id)
        .await
        .map_err(booking_error)?;
    Ok(Json(order))
}

/// `PUT /api/lessons/update`: either confirms an order by reducing lesson
/// spaces, or patches lesson fields.
pub(crate) async fn update_lessons(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LessonUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<LessonUpdateResponse>> {
    let Json(req) = payload.map_err(malformed_body)?;

    let response = match req {
        LessonUpdateRequest::ReduceSpaces {
            order_id,
            cart_items,
        } => {
            let order_id = parse_order_id(&order_id).map_err(booking_error)?;
            let cart = Cart::parse(&cart_items).map_err(booking_error)?;
            let summary = state
                .reconciler
                .confirm_order(order_id, &cart)
                .await
                .map_err(booking_error)?;
            LessonUpdateResponse::ReduceSpaces(summary)
        }
        LessonUpdateRequest::UpdateFields { updates } => {
            let updates = LessonUpdate::parse_batch(&updates).map_err(booking_error)?;
            let summary = state
                .reconciler
                .patch_lessons(&updates)
                .await
                .map_err(booking_error)?;
            LessonUpdateResponse::UpdateFields(summary)
        }
    };

    Ok(Json(response))
}

pub(crate) async fn route_not_found(uri: Uri) -> (StatusCode, Json<RouteNotFound>) {
    (
        StatusCode::NOT_FOUND,
        Json(RouteNotFound {
            success: false,
            error: format!("Route {uri} not found"),
            timestamp: Utc::now(),
        }),
    )
}

pub(crate) async fn index() -> Html<&'static str> {
    Html(
        r#"<h1>Lesson Booking API</h1>
<h2>Available Routes</h2>
<ul>
  <li>GET <a href="/api/lessons">/api/lessons</a> - List all lessons</li>
  <li>PUT /api/lessons/update - Reduce spaces for an order or update lesson fields</li>
  <li>POST /api/orders - Create a new order</li>
  <li>GET /api/orders/:order_id - Fetch an order</li>
</ul>
"#,
    )
}

pub(crate) async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.reconciler.storage().health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            error!(error = %format!("{error:#}"), "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

pub(crate) fn status_for(err: &BookingError) -> StatusCode {
    match err {
        BookingError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BookingError::Validation(_)
        | BookingError::LessonsNotFound(_)
        | BookingError::AlreadyProcessed(_)
        | BookingError::InsufficientCapacity { .. }
        | BookingError::UpdateFailed(_) => StatusCode::BAD_REQUEST,
    }
}

fn booking_error(err: BookingError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "request failed");
    } else if let BookingError::UpdateFailed(message) = &err {
        warn!(%message, "update did not take effect");
    }
    (status, Json(ApiError::from(&err)))
}

fn malformed_body(rejection: JsonRejection) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::validation(rejection.body_text())),
    )
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
