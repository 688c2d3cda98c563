use shared::{
    domain::{LessonId, OrderId},
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

/// Every way a booking operation can fail. Business-rule variants are raised
/// before commit, so the failed operation never leaves partial writes.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),
    #[error("Lessons with IDs {} not found", join_ids(.0))]
    LessonsNotFound(Vec<LessonId>),
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),
    #[error("Order {0} has already been processed")]
    AlreadyProcessed(OrderId),
    #[error(
        "Not enough space for lesson {lesson_id}. Available: {available}, Requested: {requested}"
    )]
    InsufficientCapacity {
        lesson_id: LessonId,
        available: u32,
        requested: u32,
    },
    #[error("{0}")]
    UpdateFailed(String),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl BookingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BookingError::Validation(_) => ErrorCode::Validation,
            BookingError::LessonsNotFound(_) | BookingError::OrderNotFound(_) => {
                ErrorCode::NotFound
            }
            BookingError::AlreadyProcessed(_) => ErrorCode::AlreadyProcessed,
            BookingError::InsufficientCapacity { .. } => ErrorCode::InsufficientCapacity,
            BookingError::UpdateFailed(_) => ErrorCode::UpdateFailed,
            BookingError::Storage(_) => ErrorCode::Internal,
        }
    }
}

impl From<&BookingError> for ApiError {
    fn from(value: &BookingError) -> Self {
        match value {
            BookingError::Storage(_) => ApiError::internal(),
            other => ApiError::new(other.code(), other.to_string()),
        }
    }
}

fn join_ids(ids: &[LessonId]) -> String {
    ids.iter()
        .map(LessonId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
