use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::domain::{BookingStatus, SlotId};
use super::repository::RepositoryError;
use super::time_range::TimeRangeError;

/// Typed failures surfaced by every scheduling operation.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),
    #[error("time range overlaps existing slot {start}-{end}")]
    Overlap {
        conflicting: SlotId,
        start: String,
        end: String,
    },
    #[error("slot still holds bookings; cancel them first")]
    HasBookings,
    #[error("slot no longer available")]
    SlotFull,
    #[error("slot is closed for booking")]
    SlotClosed,
    #[error("candidate already holds a booking for this slot")]
    DuplicateBooking,
    #[error("invitation link already used")]
    AlreadyUsed,
    #[error("invitation link expired")]
    Expired,
    #[error("caller is not allowed to perform this action")]
    Forbidden,
    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for SchedulingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound("record"),
            other => Self::Repository(other),
        }
    }
}

impl SchedulingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SchedulingError::Validation(_) | SchedulingError::TimeRange(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SchedulingError::Overlap { .. }
            | SchedulingError::HasBookings
            | SchedulingError::SlotFull
            | SchedulingError::SlotClosed
            | SchedulingError::DuplicateBooking
            | SchedulingError::AlreadyUsed
            | SchedulingError::InvalidTransition { .. } => StatusCode::CONFLICT,
            SchedulingError::Expired => StatusCode::GONE,
            SchedulingError::Forbidden => StatusCode::FORBIDDEN,
            SchedulingError::NotFound(_) => StatusCode::NOT_FOUND,
            SchedulingError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SchedulingError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a candidate: no identifiers, closed slots read as full.
    pub fn public_message(&self) -> String {
        match self {
            SchedulingError::SlotFull | SchedulingError::SlotClosed => {
                "slot no longer available".to_string()
            }
            SchedulingError::AlreadyUsed => "link already used".to_string(),
            SchedulingError::Expired => "link expired".to_string(),
            SchedulingError::Overlap { start, end, .. } => {
                format!("time range overlaps existing slot {start}-{end}")
            }
            SchedulingError::Repository(_) => "scheduling temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for SchedulingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "scheduling request failed");
        }
        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}
