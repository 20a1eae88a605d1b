//! Booking routes
//!
//! Admission, owner decisions, condition reports, cancellation and the
//! rental-period sweep.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::domain::bookings::{
    Booking, CancelBookingRequest, ConditionReportRequest, CreateBookingRequest, OwnerDecisionRequest,
};
use crate::error::ApiError;
use crate::services::{admission, bookings};
use crate::store::BookingFilter;

/// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = admission::create_booking(&state.ctx, &req).await?;
    Ok(Created(booking))
}

/// POST /bookings/quote
///
/// Price a booking without reserving the dates.
pub async fn quote_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = admission::quote_booking(&state.ctx, &req).await?;
    Ok(DataResponse::new(quote))
}

/// GET /bookings/:booking_id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = bookings::get_booking(&state.ctx, booking_id).await?;
    Ok(DataResponse::new(booking))
}

pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<OwnerDecisionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = bookings::approve(&state.ctx, booking_id, req.owner_id).await?;
    Ok(DataResponse::new(booking))
}

pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<OwnerDecisionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = bookings::reject(&state.ctx, booking_id, req.owner_id).await?;
    Ok(DataResponse::new(booking))
}

/// POST /bookings/:booking_id/condition-report
pub async fn report_condition(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<ConditionReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = bookings::report_condition(&state.ctx, booking_id, req).await?;
    Ok(DataResponse::new(booking))
}

/// POST /bookings/:booking_id/cancel
///
/// Renter cancellation. The response carries the refund that applies.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = bookings::cancel(&state.ctx, booking_id, req.renter_id).await?;
    Ok(DataResponse::new(response))
}

pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = bookings::complete(&state.ctx, booking_id).await?;
    Ok(DataResponse::new(booking))
}

/// POST /bookings/sweep
pub async fn sweep_rental_periods(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = bookings::sweep_rental_periods(&state.ctx).await?;
    Ok(DataResponse::new(report))
}

/// GET /tools/:tool_id/bookings
pub async fn list_tool_bookings(
    State(state): State<Arc<AppState>>,
    Path(tool_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    list_page(&state, BookingFilter::Tool(tool_id), &pagination).await
}

/// GET /renters/:renter_id/bookings
pub async fn list_renter_bookings(
    State(state): State<Arc<AppState>>,
    Path(renter_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    list_page(&state, BookingFilter::Renter(renter_id), &pagination).await
}

pub(crate) async fn list_page(
    state: &AppState,
    filter: BookingFilter,
    pagination: &PaginationParams,
) -> Result<Paginated<Booking>, ApiError> {
    let (data, total) = bookings::list_bookings(&state.ctx, filter, pagination.window()).await?;
    Ok(Paginated::new(data, pagination, total))
}
