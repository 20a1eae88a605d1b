//! Persistence boundary.
//!
//! Services only talk to storage through [`Store`]. Besides plain lookups the
//! trait exposes the few operations that must be atomic: admitting a booking
//! against the tool calendar, applying a booking transition together with its
//! wallet effect, inserting a review together with the tool rating refresh,
//! and reserving payout funds.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Booking, BookingStatus, LedgerEffect, Payout, PayoutSettlement, Report, ReportStatus, Review,
    ReviewTarget, SubscriptionUpdate, Tool, User,
};
use crate::error::ApiResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Pure mutation applied to a booking while the store holds it locked.
pub type BookingTransition = Box<dyn FnOnce(&mut Booking) -> ApiResult<LedgerEffect> + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingFilter {
    Tool(Uuid),
    Renter(Uuid),
    Owner(Uuid),
    Statuses(Vec<BookingStatus>),
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        match self {
            Self::Tool(id) => booking.tool_id == *id,
            Self::Renter(id) => booking.renter_id == *id,
            Self::Owner(id) => booking.owner_id == *id,
            Self::Statuses(statuses) => statuses.contains(&booking.status),
        }
    }
}

/// LIMIT/OFFSET window for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>>;
    async fn list_users(&self) -> ApiResult<Vec<User>>;
    async fn insert_user(&self, user: &User) -> ApiResult<()>;
    async fn set_reputation(&self, user_id: Uuid, score: f64) -> ApiResult<()>;
    async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> ApiResult<User>;

    // Tools
    async fn get_tool(&self, id: Uuid) -> ApiResult<Option<Tool>>;
    async fn insert_tool(&self, tool: &Tool) -> ApiResult<()>;

    // Bookings
    async fn get_booking(&self, id: Uuid) -> ApiResult<Option<Booking>>;
    /// Newest first.
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        window: Option<PageWindow>,
    ) -> ApiResult<Vec<Booking>>;
    async fn count_bookings(&self, filter: &BookingFilter) -> ApiResult<u64>;

    /// Insert a new booking unless a blocking booking on the same tool
    /// intersects its dates. Fails with `OverlapConflict`.
    async fn insert_booking_if_available(&self, booking: &Booking) -> ApiResult<()>;

    /// Load the booking under lock, run `transition` and persist the booking
    /// plus its wallet effect. Nothing is written when `transition` fails.
    async fn transition_booking(
        &self,
        id: Uuid,
        transition: BookingTransition,
    ) -> ApiResult<Booking>;

    // Reviews
    async fn get_review(&self, id: Uuid) -> ApiResult<Option<Review>>;
    async fn list_reviews_for_booking(&self, booking_id: Uuid) -> ApiResult<Vec<Review>>;
    async fn list_reviews_for_target(&self, target: ReviewTarget) -> ApiResult<Vec<Review>>;
    async fn list_reviews(&self) -> ApiResult<Vec<Review>>;

    /// Insert a review and refresh the tool rating when it targets a tool.
    /// Fails with `DuplicateReview` if the (booking, type) pair exists.
    async fn insert_review(&self, review: &Review) -> ApiResult<()>;

    /// Persist a new rating/comment and refresh the tool rating.
    async fn update_review(&self, review: &Review) -> ApiResult<()>;

    // Payouts
    /// Debit the owner wallet and record the payout as PENDING.
    /// Fails with `InsufficientBalance` when the wallet cannot cover it.
    async fn reserve_payout(&self, payout: &Payout) -> ApiResult<()>;

    /// Close a PENDING payout. Failed payouts hand the amount back to the wallet.
    async fn settle_payout(
        &self,
        payout_id: Uuid,
        settlement: &PayoutSettlement,
        now: DateTime<Utc>,
    ) -> ApiResult<Payout>;

    /// Newest first.
    async fn list_payouts(&self, owner_id: Uuid, limit: Option<i64>) -> ApiResult<Vec<Payout>>;

    /// PENDING payouts of every owner, oldest first.
    async fn list_pending_payouts(&self) -> ApiResult<Vec<Payout>>;

    // Reports
    async fn insert_report(&self, report: &Report) -> ApiResult<()>;
    async fn list_reports(&self, status: Option<ReportStatus>) -> ApiResult<Vec<Report>>;
    async fn update_report_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<Report>>;
    async fn delete_report(&self, id: Uuid) -> ApiResult<bool>;

    async fn health_check(&self) -> bool;
}
