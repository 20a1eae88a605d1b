//! In-memory store for tests and local runs without PostgreSQL.
//!
//! All state sits behind a single mutex, so every trait method is atomic with
//! respect to every other one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use super::{BookingFilter, BookingTransition, PageWindow, Store};
use crate::domain::{
    Booking, Payout, PayoutSettlement, PayoutStatus, RatingSummary, Report, ReportStatus, Review,
    ReviewTarget, SubscriptionUpdate, Tool, User,
};
use crate::error::{ApiError, ApiResult};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    tools: HashMap<Uuid, Tool>,
    bookings: HashMap<Uuid, Booking>,
    reviews: HashMap<Uuid, Review>,
    payouts: HashMap<Uuid, Payout>,
    reports: HashMap<Uuid, Report>,
}

impl Inner {
    fn apply_wallet_delta(&mut self, user_id: Uuid, delta: Decimal) -> ApiResult<()> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or(ApiError::UserNotFound(user_id))?;
        user.wallet_balance = (user.wallet_balance + delta).max(Decimal::ZERO);
        Ok(())
    }

    fn refresh_tool_rating(&mut self, tool_id: Uuid) {
        let summary = RatingSummary::from_ratings(
            self.reviews
                .values()
                .filter(|r| r.target == ReviewTarget::Tool(tool_id))
                .map(|r| r.rating),
        );
        if let Some(tool) = self.tools.get_mut(&tool_id) {
            tool.overall_rating = summary.overall_rating;
            tool.num_ratings = summary.num_ratings;
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, Uuid),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>> {
        Ok(self.inner.lock().users.get(&id).cloned())
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        let mut users: Vec<User> = self.inner.lock().users.values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> ApiResult<()> {
        let mut inner = self.inner.lock();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(ApiError::conflict(format!(
                "Email {} is already registered",
                user.email
            )));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_reputation(&self, user_id: Uuid, score: f64) -> ApiResult<()> {
        let mut inner = self.inner.lock();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(ApiError::UserNotFound(user_id))?;
        user.reputation_score = score;
        Ok(())
    }

    async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> ApiResult<User> {
        let mut inner = self.inner.lock();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(ApiError::UserNotFound(user_id))?;
        user.subscription_tier = update.tier;
        user.subscription_started_at = update.started_at;
        user.subscription_ends_at = update.ends_at;
        user.subscription_reference = update.reference.clone();
        Ok(user.clone())
    }

    async fn get_tool(&self, id: Uuid) -> ApiResult<Option<Tool>> {
        Ok(self.inner.lock().tools.get(&id).cloned())
    }

    async fn insert_tool(&self, tool: &Tool) -> ApiResult<()> {
        let mut inner = self.inner.lock();
        if !inner.users.contains_key(&tool.owner_id) {
            return Err(ApiError::UserNotFound(tool.owner_id));
        }
        inner.tools.insert(tool.id, tool.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> ApiResult<Option<Booking>> {
        Ok(self.inner.lock().bookings.get(&id).cloned())
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        window: Option<PageWindow>,
    ) -> ApiResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .inner
            .lock()
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        newest_first(&mut bookings, |b| (b.created_at, b.id));

        Ok(match window {
            Some(w) => bookings
                .into_iter()
                .skip(w.offset.max(0) as usize)
                .take(w.limit.max(0) as usize)
                .collect(),
            None => bookings,
        })
    }

    async fn count_bookings(&self, filter: &BookingFilter) -> ApiResult<u64> {
        let inner = self.inner.lock();
        Ok(inner.bookings.values().filter(|b| filter.matches(b)).count() as u64)
    }

    async fn insert_booking_if_available(&self, booking: &Booking) -> ApiResult<()> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner
            .bookings
            .values()
            .filter(|b| b.tool_id == booking.tool_id)
            .find(|b| b.overlaps(booking.start_date, booking.end_date))
        {
            return Err(ApiError::OverlapConflict {
                start: existing.start_date,
                end: existing.end_date,
            });
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn transition_booking(
        &self,
        id: Uuid,
        transition: BookingTransition,
    ) -> ApiResult<Booking> {
        let mut inner = self.inner.lock();
        let mut booking = inner
            .bookings
            .get(&id)
            .cloned()
            .ok_or(ApiError::BookingNotFound(id))?;

        // Work on a copy so a failed transition leaves nothing behind
        let effect = transition(&mut booking)?;
        if !effect.is_none() {
            inner.apply_wallet_delta(booking.owner_id, effect.owner_wallet_delta)?;
        }
        inner.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn get_review(&self, id: Uuid) -> ApiResult<Option<Review>> {
        Ok(self.inner.lock().reviews.get(&id).cloned())
    }

    async fn list_reviews_for_booking(&self, booking_id: Uuid) -> ApiResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .inner
            .lock()
            .reviews
            .values()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect();
        reviews.sort_by_key(|r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn list_reviews_for_target(&self, target: ReviewTarget) -> ApiResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .inner
            .lock()
            .reviews
            .values()
            .filter(|r| r.target == target)
            .cloned()
            .collect();
        reviews.sort_by_key(|r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn list_reviews(&self) -> ApiResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self.inner.lock().reviews.values().cloned().collect();
        reviews.sort_by_key(|r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn insert_review(&self, review: &Review) -> ApiResult<()> {
        let mut inner = self.inner.lock();
        if inner
            .reviews
            .values()
            .any(|r| r.booking_id == review.booking_id && r.review_type == review.review_type)
        {
            return Err(ApiError::DuplicateReview {
                booking_id: review.booking_id,
                review_type: review.review_type.to_string(),
            });
        }
        inner.reviews.insert(review.id, review.clone());
        if let Some(tool_id) = review.target.tool_id() {
            inner.refresh_tool_rating(tool_id);
        }
        Ok(())
    }

    async fn update_review(&self, review: &Review) -> ApiResult<()> {
        let mut inner = self.inner.lock();
        let stored = inner
            .reviews
            .get_mut(&review.id)
            .ok_or(ApiError::ReviewNotFound(review.id))?;
        stored.rating = review.rating;
        stored.comment = review.comment.clone();
        stored.updated_at = review.updated_at;
        if let Some(tool_id) = review.target.tool_id() {
            inner.refresh_tool_rating(tool_id);
        }
        Ok(())
    }

    async fn reserve_payout(&self, payout: &Payout) -> ApiResult<()> {
        let mut inner = self.inner.lock();
        let user = inner
            .users
            .get_mut(&payout.owner_id)
            .ok_or(ApiError::UserNotFound(payout.owner_id))?;
        if user.wallet_balance < payout.amount {
            return Err(ApiError::InsufficientBalance {
                available: user.wallet_balance,
                requested: payout.amount,
            });
        }
        user.wallet_balance -= payout.amount;
        inner.payouts.insert(payout.id, payout.clone());
        Ok(())
    }

    async fn settle_payout(
        &self,
        payout_id: Uuid,
        settlement: &PayoutSettlement,
        now: DateTime<Utc>,
    ) -> ApiResult<Payout> {
        let mut inner = self.inner.lock();
        let mut payout = inner
            .payouts
            .get(&payout_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("Payout {} not found", payout_id)))?;
        if payout.status != PayoutStatus::Pending {
            return Err(ApiError::conflict(format!(
                "Payout {} is already {}",
                payout_id,
                payout.status.as_str()
            )));
        }

        match settlement {
            PayoutSettlement::Completed { transfer_id } => {
                payout.status = PayoutStatus::Completed;
                payout.external_transfer_id = Some(transfer_id.clone());
                payout.completed_at = Some(now);
            }
            PayoutSettlement::Failed { reason } => {
                payout.status = PayoutStatus::Failed;
                payout.failure_reason = Some(reason.clone());
                inner.apply_wallet_delta(payout.owner_id, payout.amount)?;
            }
        }
        inner.payouts.insert(payout_id, payout.clone());
        Ok(payout)
    }

    async fn list_payouts(&self, owner_id: Uuid, limit: Option<i64>) -> ApiResult<Vec<Payout>> {
        let mut payouts: Vec<Payout> = self
            .inner
            .lock()
            .payouts
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut payouts, |p| (p.requested_at, p.id));
        if let Some(limit) = limit {
            payouts.truncate(limit.max(0) as usize);
        }
        Ok(payouts)
    }

    async fn list_pending_payouts(&self) -> ApiResult<Vec<Payout>> {
        let mut payouts: Vec<Payout> = self
            .inner
            .lock()
            .payouts
            .values()
            .filter(|p| p.status == PayoutStatus::Pending)
            .cloned()
            .collect();
        payouts.sort_by_key(|p| (p.requested_at, p.id));
        Ok(payouts)
    }

    async fn insert_report(&self, report: &Report) -> ApiResult<()> {
        self.inner.lock().reports.insert(report.id, report.clone());
        Ok(())
    }

    async fn list_reports(&self, status: Option<ReportStatus>) -> ApiResult<Vec<Report>> {
        let mut reports: Vec<Report> = self
            .inner
            .lock()
            .reports
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        newest_first(&mut reports, |r| (r.created_at, r.id));
        Ok(reports)
    }

    async fn update_report_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<Report>> {
        let mut inner = self.inner.lock();
        Ok(inner.reports.get_mut(&id).map(|report| {
            report.status = status;
            report.updated_at = now;
            report.clone()
        }))
    }

    async fn delete_report(&self, id: Uuid) -> ApiResult<bool> {
        Ok(self.inner.lock().reports.remove(&id).is_some())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
