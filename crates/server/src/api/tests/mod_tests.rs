use super::*;
use shared::{
    domain::{LessonId, OrderId},
    error::ErrorCode,
};

#[test]
fn unknown_order_maps_to_not_found() {
    let err = BookingError::OrderNotFound(OrderId::generate());
    assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
}

#[test]
fn business_rule_failures_map_to_bad_request() {
    let cases = [
        BookingError::Validation("name is required".into()),
        BookingError::LessonsNotFound(vec![LessonId::new("XX99")]),
        BookingError::AlreadyProcessed(OrderId::generate()),
        BookingError::InsufficientCapacity {
            lesson_id: LessonId::new("SN01"),
            available: 0,
            requested: 1,
        },
        BookingError::UpdateFailed("Update for lesson SN01 did not apply".into()),
    ];
    for err in &cases {
        assert_eq!(status_for(err), StatusCode::BAD_REQUEST, "{err}");
    }
}

#[test]
fn storage_failure_is_generic_internal_error() {
    let (status, Json(body)) = booking_error(BookingError::Storage(anyhow::anyhow!(
        "no such table: lessons"
    )));
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.code, ErrorCode::Internal);
    assert!(!body.message.contains("lessons"));
}

#[test]
fn capacity_error_names_the_lesson_and_counts() {
    let (_, Json(body)) = booking_error(BookingError::InsufficientCapacity {
        lesson_id: LessonId::new("SN01"),
        available: 0,
        requested: 2,
    });
    assert_eq!(body.code, ErrorCode::InsufficientCapacity);
    assert_eq!(
        body.message,
        "Not enough space for lesson SN01. Available: 0, Requested: 2"
    );
}
