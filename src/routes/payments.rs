//! Payment routes
//!
//! Checkout sessions, client-side confirmations and the gateway webhook.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::domain::payments::{CheckoutSessionRequest, DepositConfirmRequest, WebhookAck};
use crate::error::ApiError;
use crate::middleware::RequestIdExt;
use crate::services::payments;

/// Header carrying the gateway's webhook signature
const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /payments/checkout-session
pub async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = payments::create_checkout_session(&state.ctx, &req).await?;
    Ok(DataResponse::new(session))
}

/// POST /payments/bookings/:booking_id/deposit-session
pub async fn create_deposit_session(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = payments::create_deposit_checkout_session(&state.ctx, booking_id).await?;
    Ok(DataResponse::new(session))
}

/// POST /payments/bookings/:booking_id/mark-paid
pub async fn mark_paid(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = payments::confirm_payment(&state.ctx, booking_id).await?;
    Ok(DataResponse::new(booking))
}

/// POST /payments/bookings/:booking_id/deposit/mark-paid
pub async fn mark_deposit_paid(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<DepositConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = payments::confirm_deposit(&state.ctx, booking_id, req.renter_id).await?;
    Ok(DataResponse::new(booking))
}

/// GET /payments/bookings/:booking_id/status
pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = payments::payment_status(&state.ctx, booking_id).await?;
    Ok(DataResponse::new(status))
}

/// POST /payments/webhook
///
/// Takes the raw body: the signature covers the exact bytes sent.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;

    tracing::debug!(request_id = ?headers.request_id(), "Webhook received");

    let outcome = payments::handle_webhook(&state.ctx, &body, signature).await?;
    Ok(Json(WebhookAck::from(outcome)))
}
