//! Owner routes: listings, earnings, wallet and payouts

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::bookings::list_page;
use crate::api::{Created, DataResponse, ListResponse, PaginationParams};
use crate::app::AppState;
use crate::domain::payouts::PayoutRequest;
use crate::error::ApiError;
use crate::services::{payments, reputation};
use crate::store::BookingFilter;

/// GET /owners/:owner_id/bookings
pub async fn list_owner_bookings(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    list_page(&state, BookingFilter::Owner(owner_id), &pagination).await
}

/// GET /owners/:owner_id/earnings
pub async fn monthly_earnings(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let report = reputation::monthly_earnings(&state.ctx, owner_id).await?;
    Ok(DataResponse::new(report))
}

/// GET /owners/:owner_id/wallet
pub async fn wallet(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = payments::owner_wallet(&state.ctx, owner_id).await?;
    Ok(DataResponse::new(wallet))
}

/// GET /owners/:owner_id/payouts
pub async fn payout_history(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payouts = payments::payout_history(&state.ctx, owner_id).await?;
    Ok(ListResponse::from(payouts))
}

/// POST /owners/:owner_id/payouts
pub async fn request_payout(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
    Json(req): Json<PayoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payout = payments::request_payout(&state.ctx, owner_id, req.amount).await?;
    Ok(Created(payout))
}
