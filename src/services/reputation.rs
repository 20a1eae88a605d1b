//! Reputation and earnings aggregation.
//!
//! Reputation is always recomputed from the full review history, never
//! nudged incrementally, so running it twice gives the same result.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

use super::ServiceContext;
use crate::domain::earnings::{monthly_earnings as rollup, EarningsReport};
use crate::domain::users::DEFAULT_REPUTATION;
use crate::domain::{Review, ReviewTarget};
use crate::error::ApiResult;
use crate::store::BookingFilter;

/// Reputation writes in flight during a full recalculation.
const WRITE_CONCURRENCY: usize = 8;

/// Mean of the given ratings, or the default for users nobody reviewed.
pub fn reputation_from_ratings(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return DEFAULT_REPUTATION;
    }
    let sum: i64 = ratings.iter().map(|&r| r as i64).sum();
    sum as f64 / ratings.len() as f64
}

/// Ratings received by each user through user-targeted reviews.
fn ratings_by_user(reviews: &[Review]) -> HashMap<Uuid, Vec<i32>> {
    let mut by_user: HashMap<Uuid, Vec<i32>> = HashMap::new();
    for review in reviews {
        if let ReviewTarget::User(user_id) = review.target {
            by_user.entry(user_id).or_default().push(review.rating);
        }
    }
    by_user
}

/// Recompute every user's reputation. Returns the number of users checked.
#[instrument(skip(ctx))]
pub async fn recalculate_all_reputations(ctx: &ServiceContext) -> ApiResult<usize> {
    let users = ctx.store.list_users().await?;
    let reviews = ctx.store.list_reviews().await?;
    let by_user = ratings_by_user(&reviews);

    let changed: Vec<(Uuid, f64)> = users
        .iter()
        .filter_map(|user| {
            let score = by_user
                .get(&user.id)
                .map_or(DEFAULT_REPUTATION, |ratings| reputation_from_ratings(ratings));
            ((score - user.reputation_score).abs() > f64::EPSILON).then_some((user.id, score))
        })
        .collect();
    let written = changed.len();

    stream::iter(changed)
        .map(|(user_id, score)| async move { ctx.store.set_reputation(user_id, score).await })
        .buffer_unordered(WRITE_CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await?;

    tracing::info!(
        users = users.len(),
        reviews = reviews.len(),
        changed = written,
        "Reputations recalculated"
    );
    Ok(users.len())
}

/// Recompute one user's reputation after a review about them changed.
pub async fn refresh_user_reputation(ctx: &ServiceContext, user_id: Uuid) -> ApiResult<f64> {
    let reviews = ctx
        .store
        .list_reviews_for_target(ReviewTarget::User(user_id))
        .await?;
    let ratings: Vec<i32> = reviews.iter().map(|r| r.rating).collect();
    let score = reputation_from_ratings(&ratings);

    ctx.store.set_reputation(user_id, score).await?;
    tracing::debug!(user_id = %user_id, score, "Reputation refreshed");
    Ok(score)
}

/// Monthly earnings of an owner from completed, paid bookings, oldest first.
#[instrument(skip(ctx))]
pub async fn monthly_earnings(ctx: &ServiceContext, owner_id: Uuid) -> ApiResult<EarningsReport> {
    ctx.user(owner_id).await?;

    let bookings = ctx
        .store
        .list_bookings(&BookingFilter::Owner(owner_id), None)
        .await?;

    Ok(EarningsReport::new(owner_id, rollup(&bookings)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reputation_defaults_and_means() {
        assert_eq!(reputation_from_ratings(&[]), DEFAULT_REPUTATION);
        assert!((reputation_from_ratings(&[4, 5, 3]) - 4.0).abs() < f64::EPSILON);
        assert!((reputation_from_ratings(&[1, 2]) - 1.5).abs() < f64::EPSILON);
    }
}
