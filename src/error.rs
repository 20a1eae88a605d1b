//! Unified API error handling
//!
//! Every core operation returns `ApiResult<T>`. Variants are grouped by how a
//! caller should react. Validation and conflict errors are final. A
//! `PaymentProcessing` error means the gateway refused the request, while
//! `PaymentOutcomeUnknown` means it may still have gone through. Internal
//! errors never leak details.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    // Validation
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),

    #[error("Invalid payout: {0}")]
    InvalidPayout(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    // Not found
    #[error("Tool not found: {0}")]
    ToolNotFound(Uuid),

    #[error("Renter not found: {0}")]
    RenterNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Review not found: {0}")]
    ReviewNotFound(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    // Authorization
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    // Conflicts
    #[error("Tool is already booked between {start} and {end}")]
    OverlapConflict { start: NaiveDate, end: NaiveDate },

    #[error("Booking is already paid: {0}")]
    PaymentAlreadyCompleted(Uuid),

    #[error("No deposit required or already paid for booking: {0}")]
    DepositNotRequired(Uuid),

    #[error("A {review_type} review already exists for booking {booking_id}")]
    DuplicateReview {
        booking_id: Uuid,
        review_type: String,
    },

    #[error("Booking must be completed to leave a review: {0}")]
    BookingNotComplete(Uuid),

    #[error("Cannot {action} a booking that is {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("Insufficient balance. Available: {available}, requested: {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    // Integration
    #[error("Payment processing failed: {0}")]
    PaymentProcessing(String),

    /// The request may have reached the gateway; its result is not known.
    #[error("Payment outcome unknown: {0}")]
    PaymentOutcomeUnknown(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDateRange(_)
            | Self::InvalidRating(_)
            | Self::InvalidPayout(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ToolNotFound(_)
            | Self::RenterNotFound(_)
            | Self::UserNotFound(_)
            | Self::BookingNotFound(_)
            | Self::ReviewNotFound(_)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::OverlapConflict { .. }
            | Self::PaymentAlreadyCompleted(_)
            | Self::DepositNotRequired(_)
            | Self::DuplicateReview { .. }
            | Self::BookingNotComplete(_)
            | Self::InvalidTransition { .. }
            | Self::InsufficientBalance { .. }
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentProcessing(_) => StatusCode::BAD_GATEWAY,
            Self::PaymentOutcomeUnknown(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidDateRange(_) => "INVALID_DATE_RANGE",
            Self::InvalidRating(_) => "INVALID_RATING",
            Self::InvalidPayout(_) => "INVALID_PAYOUT",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ToolNotFound(_) => "TOOL_NOT_FOUND",
            Self::RenterNotFound(_) => "RENTER_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            Self::ReviewNotFound(_) => "REVIEW_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::OverlapConflict { .. } => "OVERLAP_CONFLICT",
            Self::PaymentAlreadyCompleted(_) => "PAYMENT_ALREADY_COMPLETED",
            Self::DepositNotRequired(_) => "DEPOSIT_NOT_REQUIRED",
            Self::DuplicateReview { .. } => "DUPLICATE_REVIEW",
            Self::BookingNotComplete(_) => "BOOKING_NOT_COMPLETE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::Conflict(_) => "CONFLICT",
            Self::PaymentProcessing(_) => "PAYMENT_PROCESSING_ERROR",
            Self::PaymentOutcomeUnknown(_) => "PAYMENT_OUTCOME_UNKNOWN",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            // Don't leak internal error details
            Self::Internal(_) | Self::Database(_) => "An internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            Self::Database(e) => {
                tracing::error!(error = ?e, "Database error");
            }
            Self::PaymentProcessing(msg) | Self::PaymentOutcomeUnknown(msg) => {
                tracing::error!(error = %msg, code = self.error_code(), "Payment gateway error");
            }
            _ => {
                tracing::warn!(error = %self, code = self.error_code(), "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_map_to_409() {
        let id = Uuid::new_v4();
        assert_eq!(
            ApiError::PaymentAlreadyCompleted(id).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::DuplicateReview {
                booking_id: id,
                review_type: "renter_to_tool".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::OverlapConflict {
                start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            }
            .error_code(),
            "OVERLAP_CONFLICT"
        );
    }

    #[test]
    fn test_gateway_errors_are_bad_gateway() {
        let err = ApiError::PaymentProcessing("card_declined".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), "PAYMENT_PROCESSING_ERROR");

        let err = ApiError::PaymentOutcomeUnknown("operation timed out".into());
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.error_code(), "PAYMENT_OUTCOME_UNKNOWN");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::internal("connection refused on 10.0.0.3");
        assert_eq!(err.public_message(), "An internal error occurred");

        let err = ApiError::InvalidRating(7);
        assert!(err.public_message().contains('7'));
    }
}
