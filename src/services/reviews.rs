//! Review engine.

use tracing::instrument;
use uuid::Uuid;

use super::{reputation, ServiceContext};
use crate::domain::bookings::BookingStatus;
use crate::domain::reviews::{validate_rating, CreateReviewRequest, UpdateReviewRequest};
use crate::domain::{Review, ReviewType};
use crate::error::{ApiError, ApiResult};

/// Create a review for a completed booking.
///
/// The review type follows from who the reviewer is on the booking. Tool
/// ratings are refreshed by the store alongside the insert. User reputation
/// is refreshed right after, on a best-effort basis.
#[instrument(skip(ctx, req), fields(booking_id = %req.booking_id, reviewer_id = %req.reviewer_id))]
pub async fn create_review(ctx: &ServiceContext, req: CreateReviewRequest) -> ApiResult<Review> {
    validate_rating(req.rating)?;

    let booking = ctx.booking(req.booking_id).await?;
    if booking.status != BookingStatus::Completed {
        return Err(ApiError::BookingNotComplete(booking.id));
    }

    let review_type = ReviewType::infer(&booking, req.reviewer_id, req.review_type)?;

    let existing = ctx.store.list_reviews_for_booking(booking.id).await?;
    if existing.iter().any(|r| r.review_type == review_type) {
        return Err(ApiError::DuplicateReview {
            booking_id: booking.id,
            review_type: review_type.to_string(),
        });
    }

    let now = ctx.clock.now();
    let review = Review {
        id: Uuid::new_v4(),
        booking_id: booking.id,
        reviewer_id: req.reviewer_id,
        review_type,
        target: review_type.target_for(&booking),
        rating: req.rating,
        comment: req.comment,
        created_at: now,
        updated_at: now,
    };
    ctx.store.insert_review(&review).await?;

    refresh_target_reputation(ctx, &review).await;

    tracing::info!(
        review_id = %review.id,
        review_type = %review.review_type,
        rating = review.rating,
        "Review created"
    );
    Ok(review)
}

#[instrument(skip(ctx, req), fields(reviewer_id = %req.reviewer_id))]
pub async fn update_review(
    ctx: &ServiceContext,
    review_id: Uuid,
    req: UpdateReviewRequest,
) -> ApiResult<Review> {
    validate_rating(req.rating)?;

    let mut review = ctx
        .store
        .get_review(review_id)
        .await?
        .ok_or(ApiError::ReviewNotFound(review_id))?;

    if review.reviewer_id != req.reviewer_id {
        return Err(ApiError::forbidden("Only the author can edit this review"));
    }

    review.rating = req.rating;
    review.comment = req.comment;
    review.updated_at = ctx.clock.now();
    ctx.store.update_review(&review).await?;

    refresh_target_reputation(ctx, &review).await;

    tracing::info!(review_id = %review.id, rating = review.rating, "Review updated");
    Ok(review)
}

/// Refresh the reviewed user's reputation. The review is already stored, so a
/// failure is logged and left to the next full recalculation.
async fn refresh_target_reputation(ctx: &ServiceContext, review: &Review) {
    let Some(user_id) = review.target.user_id() else {
        return;
    };
    if let Err(e) = reputation::refresh_user_reputation(ctx, user_id).await {
        tracing::warn!(
            review_id = %review.id,
            user_id = %user_id,
            error = %e,
            "Reputation refresh failed"
        );
    }
}

pub async fn reviews_for_booking(ctx: &ServiceContext, booking_id: Uuid) -> ApiResult<Vec<Review>> {
    ctx.booking(booking_id).await?;
    ctx.store.list_reviews_for_booking(booking_id).await
}
