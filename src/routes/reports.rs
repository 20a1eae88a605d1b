//! Moderation reports filed against tools and bookings

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, ListResponse, NoContent};
use crate::app::AppState;
use crate::domain::reports::{CreateReportRequest, ReportFilter, UpdateReportStatusRequest};
use crate::error::ApiError;
use crate::services::reports;

pub async fn create_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = reports::create_report(&state.ctx, req).await?;
    Ok(Created(report))
}

/// GET /reports?status=OPEN
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ReportFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let reports = reports::list_reports(&state.ctx, filter.status).await?;
    Ok(ListResponse::from(reports))
}

pub async fn update_report_status(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<Uuid>,
    Json(req): Json<UpdateReportStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = reports::update_report_status(&state.ctx, report_id, req.status).await?;
    Ok(DataResponse::new(report))
}

pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<Uuid>,
) -> Result<NoContent, ApiError> {
    reports::delete_report(&state.ctx, report_id).await?;
    Ok(NoContent)
}
