//! Pro subscription routes

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::error::ApiError;
use crate::services::subscriptions;

/// GET /subscriptions/:user_id
pub async fn subscription_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = subscriptions::subscription_status(&state.ctx, user_id).await?;
    Ok(DataResponse::new(status))
}

/// POST /subscriptions/:user_id
///
/// Opens a checkout session. The membership turns on when the gateway
/// reports the payment through the webhook.
pub async fn create_pro_checkout(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = subscriptions::create_pro_checkout(&state.ctx, user_id).await?;
    Ok(DataResponse::new(session))
}

/// DELETE /subscriptions/:user_id
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    subscriptions::cancel_subscription(&state.ctx, user_id).await?;
    Ok(MessageResponse::new(
        "SUBSCRIPTION_CANCELLED",
        "Pro subscription cancelled",
    ))
}
