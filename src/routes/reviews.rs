use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, ListResponse};
use crate::app::AppState;
use crate::domain::reviews::{CreateReviewRequest, UpdateReviewRequest};
use crate::error::ApiError;
use crate::services::reviews;

/// POST /reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let review = reviews::create_review(&state.ctx, req).await?;
    Ok(Created(review))
}

/// PUT /reviews/:review_id
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<UpdateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let review = reviews::update_review(&state.ctx, review_id, req).await?;
    Ok(DataResponse::new(review))
}

/// GET /bookings/:booking_id/reviews
pub async fn list_booking_reviews(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reviews = reviews::reviews_for_booking(&state.ctx, booking_id).await?;
    Ok(ListResponse::from(reviews))
}
