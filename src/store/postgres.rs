//! PostgreSQL store.
//!
//! Atomic operations run inside a transaction that locks the rows they read
//! (`SELECT ... FOR UPDATE`). The schema backs the two uniqueness rules with
//! constraints of its own: an exclusion constraint for overlapping bookings and
//! a unique key on (booking_id, review_type).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{BookingFilter, BookingTransition, PageWindow, Store};
use crate::domain::{
    Booking, ConditionStatus, Payout, PayoutSettlement, PayoutStatus, Report, ReportStatus, Review,
    ReviewTarget, ReviewType, SubscriptionUpdate, Tool, User,
};
use crate::error::{ApiError, ApiResult};

const EXCLUSION_VIOLATION: &str = "23P01";
const UNIQUE_VIOLATION: &str = "23505";

const USER_COLUMNS: &str = "id, name, email, role, status, reputation_score, wallet_balance, \
    subscription_tier, subscription_started_at, subscription_ends_at, subscription_reference, created_at";

const TOOL_COLUMNS: &str = "id, owner_id, title, description, price_per_day, district, active, \
    overall_rating, num_ratings, created_at";

const BOOKING_COLUMNS: &str = "id, tool_id, renter_id, owner_id, start_date, end_date, status, \
    payment_status, total_price, paid_at, condition_status, condition_description, \
    condition_reported_by, condition_reported_at, deposit_status, deposit_amount, deposit_paid_at, \
    cancelled_at, refund_amount, created_at, updated_at";

const REVIEW_COLUMNS: &str = "id, booking_id, reviewer_id, review_type, target_kind, target_id, \
    rating, comment, created_at, updated_at";

const PAYOUT_COLUMNS: &str = "id, owner_id, amount, status, external_transfer_id, failure_reason, \
    requested_at, completed_at";

const REPORT_COLUMNS: &str = "id, reporter_id, tool_id, booking_id, title, description, status, \
    created_at, updated_at";

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    status: String,
    reputation_score: f64,
    wallet_balance: Decimal,
    subscription_tier: String,
    subscription_started_at: Option<DateTime<Utc>>,
    subscription_ends_at: Option<DateTime<Utc>>,
    subscription_reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.into(),
            status: row.status.into(),
            reputation_score: row.reputation_score,
            wallet_balance: row.wallet_balance,
            subscription_tier: row.subscription_tier.into(),
            subscription_started_at: row.subscription_started_at,
            subscription_ends_at: row.subscription_ends_at,
            subscription_reference: row.subscription_reference,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ToolRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: Option<String>,
    price_per_day: Decimal,
    district: Option<String>,
    active: bool,
    overall_rating: f64,
    num_ratings: i32,
    created_at: DateTime<Utc>,
}

impl From<ToolRow> for Tool {
    fn from(row: ToolRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            price_per_day: row.price_per_day,
            district: row.district,
            active: row.active,
            overall_rating: row.overall_rating,
            num_ratings: row.num_ratings,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    tool_id: Uuid,
    renter_id: Uuid,
    owner_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    payment_status: String,
    total_price: Decimal,
    paid_at: Option<DateTime<Utc>>,
    condition_status: Option<String>,
    condition_description: Option<String>,
    condition_reported_by: Option<Uuid>,
    condition_reported_at: Option<DateTime<Utc>>,
    deposit_status: String,
    deposit_amount: Decimal,
    deposit_paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    refund_amount: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id,
            tool_id: row.tool_id,
            renter_id: row.renter_id,
            owner_id: row.owner_id,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status.into(),
            payment_status: row.payment_status.into(),
            total_price: row.total_price,
            paid_at: row.paid_at,
            condition_status: row.condition_status.as_deref().and_then(ConditionStatus::parse),
            condition_description: row.condition_description,
            condition_reported_by: row.condition_reported_by,
            condition_reported_at: row.condition_reported_at,
            deposit_status: row.deposit_status.into(),
            deposit_amount: row.deposit_amount,
            deposit_paid_at: row.deposit_paid_at,
            cancelled_at: row.cancelled_at,
            refund_amount: row.refund_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    booking_id: Uuid,
    reviewer_id: Uuid,
    review_type: String,
    target_kind: String,
    target_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        let target = match row.target_kind.as_str() {
            "tool" => ReviewTarget::Tool(row.target_id),
            _ => ReviewTarget::User(row.target_id),
        };

        Self {
            id: row.id,
            booking_id: row.booking_id,
            reviewer_id: row.reviewer_id,
            review_type: ReviewType::from(row.review_type),
            target,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PayoutRow {
    id: Uuid,
    owner_id: Uuid,
    amount: Decimal,
    status: String,
    external_transfer_id: Option<String>,
    failure_reason: Option<String>,
    requested_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<PayoutRow> for Payout {
    fn from(row: PayoutRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            amount: row.amount,
            status: row.status.into(),
            external_transfer_id: row.external_transfer_id,
            failure_reason: row.failure_reason,
            requested_at: row.requested_at,
            completed_at: row.completed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    reporter_id: Uuid,
    tool_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    title: String,
    description: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            reporter_id: row.reporter_id,
            tool_id: row.tool_id,
            booking_id: row.booking_id,
            title: row.title,
            description: row.description,
            status: row.status.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn target_parts(target: ReviewTarget) -> (&'static str, Uuid) {
    match target {
        ReviewTarget::Tool(id) => ("tool", id),
        ReviewTarget::User(id) => ("user", id),
    }
}

fn violates(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

/// WHERE clause and its single bind value for a booking filter.
enum FilterBind {
    Id(Uuid),
    Statuses(Vec<String>),
}

fn filter_clause(filter: &BookingFilter) -> (&'static str, FilterBind) {
    match filter {
        BookingFilter::Tool(id) => ("tool_id = $1", FilterBind::Id(*id)),
        BookingFilter::Renter(id) => ("renter_id = $1", FilterBind::Id(*id)),
        BookingFilter::Owner(id) => ("owner_id = $1", FilterBind::Id(*id)),
        BookingFilter::Statuses(statuses) => (
            "status = ANY($1)",
            FilterBind::Statuses(statuses.iter().map(|s| s.as_str().to_string()).collect()),
        ),
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_booking(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> ApiResult<Booking> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Booking::from).ok_or(ApiError::BookingNotFound(id))
    }

    async fn apply_wallet_delta(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        delta: Decimal,
    ) -> ApiResult<()> {
        // Debits saturate at zero
        let result = sqlx::query(
            "UPDATE users SET wallet_balance = GREATEST(wallet_balance + $1, 0) WHERE id = $2",
        )
        .bind(delta)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn refresh_tool_rating(
        tx: &mut Transaction<'_, Postgres>,
        tool_id: Uuid,
    ) -> ApiResult<()> {
        sqlx::query(
            r#"
            UPDATE tools SET
                overall_rating = COALESCE(agg.avg_rating, 0),
                num_ratings = agg.num_ratings
            FROM (
                SELECT AVG(rating)::DOUBLE PRECISION AS avg_rating, COUNT(*)::INTEGER AS num_ratings
                FROM reviews
                WHERE target_kind = 'tool' AND target_id = $1
            ) agg
            WHERE tools.id = $1
            "#,
        )
        .bind(tool_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn lock_tool(tx: &mut Transaction<'_, Postgres>, tool_id: Uuid) -> ApiResult<()> {
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM tools WHERE id = $1 FOR UPDATE")
            .bind(tool_id)
            .fetch_optional(&mut **tx)
            .await?;
        found.map(|_| ()).ok_or(ApiError::ToolNotFound(tool_id))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at, id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_user(&self, user: &User) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, status, reputation_score, wallet_balance,
                subscription_tier, subscription_started_at, subscription_ends_at, subscription_reference, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.reputation_score)
        .bind(user.wallet_balance)
        .bind(user.subscription_tier.as_str())
        .bind(user.subscription_started_at)
        .bind(user.subscription_ends_at)
        .bind(&user.subscription_reference)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, UNIQUE_VIOLATION) {
                ApiError::conflict(format!("Email {} is already registered", user.email))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn set_reputation(&self, user_id: Uuid, score: f64) -> ApiResult<()> {
        let result = sqlx::query("UPDATE users SET reputation_score = $1 WHERE id = $2")
            .bind(score)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> ApiResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                subscription_tier = $1,
                subscription_started_at = $2,
                subscription_ends_at = $3,
                subscription_reference = $4
            WHERE id = $5
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(update.tier.as_str())
        .bind(update.started_at)
        .bind(update.ends_at)
        .bind(&update.reference)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(ApiError::UserNotFound(user_id))
    }

    async fn get_tool(&self, id: Uuid) -> ApiResult<Option<Tool>> {
        let row = sqlx::query_as::<_, ToolRow>(&format!(
            "SELECT {} FROM tools WHERE id = $1",
            TOOL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_tool(&self, tool: &Tool) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tools (id, owner_id, title, description, price_per_day, district, active,
                overall_rating, num_ratings, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(tool.id)
        .bind(tool.owner_id)
        .bind(&tool.title)
        .bind(&tool.description)
        .bind(tool.price_per_day)
        .bind(&tool.district)
        .bind(tool.active)
        .bind(tool.overall_rating)
        .bind(tool.num_ratings)
        .bind(tool.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> ApiResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        window: Option<PageWindow>,
    ) -> ApiResult<Vec<Booking>> {
        let (clause, bind) = filter_clause(filter);
        let (limit, offset) = window.map_or((None, 0), |w| (Some(w.limit), w.offset));

        let sql = format!(
            "SELECT {} FROM bookings WHERE {} ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            BOOKING_COLUMNS, clause
        );
        let query = sqlx::query_as::<_, BookingRow>(&sql);
        let query = match bind {
            FilterBind::Id(id) => query.bind(id),
            FilterBind::Statuses(statuses) => query.bind(statuses),
        };

        // LIMIT NULL means no limit
        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_bookings(&self, filter: &BookingFilter) -> ApiResult<u64> {
        let (clause, bind) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM bookings WHERE {}", clause);
        let query = sqlx::query_scalar::<_, i64>(&sql);
        let query = match bind {
            FilterBind::Id(id) => query.bind(id),
            FilterBind::Statuses(statuses) => query.bind(statuses),
        };
        let total = query.fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn insert_booking_if_available(&self, booking: &Booking) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        // Serialise admissions per tool
        Self::lock_tool(&mut tx, booking.tool_id).await?;

        let existing: Option<(NaiveDate, NaiveDate)> = sqlx::query_as(
            r#"
            SELECT start_date, end_date FROM bookings
            WHERE tool_id = $1
              AND status NOT IN ('CANCELLED', 'REJECTED')
              AND start_date <= $3
              AND end_date >= $2
            ORDER BY start_date
            LIMIT 1
            "#,
        )
        .bind(booking.tool_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((start, end)) = existing {
            return Err(ApiError::OverlapConflict { start, end });
        }

        sqlx::query(
            r#"
            INSERT INTO bookings (id, tool_id, renter_id, owner_id, start_date, end_date, status,
                payment_status, total_price, deposit_status, deposit_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(booking.id)
        .bind(booking.tool_id)
        .bind(booking.renter_id)
        .bind(booking.owner_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.total_price)
        .bind(booking.deposit_status.as_str())
        .bind(booking.deposit_amount)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if violates(&e, EXCLUSION_VIOLATION) {
                ApiError::OverlapConflict {
                    start: booking.start_date,
                    end: booking.end_date,
                }
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn transition_booking(
        &self,
        id: Uuid,
        transition: BookingTransition,
    ) -> ApiResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = Self::lock_booking(&mut tx, id).await?;

        // Dropping the transaction on error rolls everything back
        let effect = transition(&mut booking)?;

        sqlx::query(
            r#"
            UPDATE bookings SET
                status = $2,
                payment_status = $3,
                paid_at = $4,
                condition_status = $5,
                condition_description = $6,
                condition_reported_by = $7,
                condition_reported_at = $8,
                deposit_status = $9,
                deposit_amount = $10,
                deposit_paid_at = $11,
                cancelled_at = $12,
                refund_amount = $13,
                updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.paid_at)
        .bind(booking.condition_status.map(|c| c.as_str()))
        .bind(&booking.condition_description)
        .bind(booking.condition_reported_by)
        .bind(booking.condition_reported_at)
        .bind(booking.deposit_status.as_str())
        .bind(booking.deposit_amount)
        .bind(booking.deposit_paid_at)
        .bind(booking.cancelled_at)
        .bind(booking.refund_amount)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        if !effect.is_none() {
            Self::apply_wallet_delta(&mut tx, booking.owner_id, effect.owner_wallet_delta).await?;
        }

        tx.commit().await?;
        Ok(booking)
    }

    async fn get_review(&self, id: Uuid) -> ApiResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews WHERE id = $1",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_reviews_for_booking(&self, booking_id: Uuid) -> ApiResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews WHERE booking_id = $1 ORDER BY created_at, id",
            REVIEW_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_reviews_for_target(&self, target: ReviewTarget) -> ApiResult<Vec<Review>> {
        let (kind, target_id) = target_parts(target);
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews WHERE target_kind = $1 AND target_id = $2 ORDER BY created_at, id",
            REVIEW_COLUMNS
        ))
        .bind(kind)
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_reviews(&self) -> ApiResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews ORDER BY created_at, id",
            REVIEW_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_review(&self, review: &Review) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        let (kind, target_id) = target_parts(review.target);

        if let ReviewTarget::Tool(tool_id) = review.target {
            Self::lock_tool(&mut tx, tool_id).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO reviews (id, booking_id, reviewer_id, review_type, target_kind, target_id,
                rating, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(review.id)
        .bind(review.booking_id)
        .bind(review.reviewer_id)
        .bind(review.review_type.as_str())
        .bind(kind)
        .bind(target_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if violates(&e, UNIQUE_VIOLATION) {
                ApiError::DuplicateReview {
                    booking_id: review.booking_id,
                    review_type: review.review_type.to_string(),
                }
            } else {
                e.into()
            }
        })?;

        if let ReviewTarget::Tool(tool_id) = review.target {
            Self::refresh_tool_rating(&mut tx, tool_id).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_review(&self, review: &Review) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        if let ReviewTarget::Tool(tool_id) = review.target {
            Self::lock_tool(&mut tx, tool_id).await?;
        }

        let result = sqlx::query(
            "UPDATE reviews SET rating = $2, comment = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(review.id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::ReviewNotFound(review.id));
        }

        if let ReviewTarget::Tool(tool_id) = review.target {
            Self::refresh_tool_rating(&mut tx, tool_id).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn reserve_payout(&self, payout: &Payout) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT wallet_balance FROM users WHERE id = $1 FOR UPDATE")
                .bind(payout.owner_id)
                .fetch_optional(&mut *tx)
                .await?;
        let balance = balance.ok_or(ApiError::UserNotFound(payout.owner_id))?;

        if balance < payout.amount {
            return Err(ApiError::InsufficientBalance {
                available: balance,
                requested: payout.amount,
            });
        }

        sqlx::query("UPDATE users SET wallet_balance = wallet_balance - $1 WHERE id = $2")
            .bind(payout.amount)
            .bind(payout.owner_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO payouts (id, owner_id, amount, status, requested_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(payout.id)
        .bind(payout.owner_id)
        .bind(payout.amount)
        .bind(payout.status.as_str())
        .bind(payout.requested_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn settle_payout(
        &self,
        payout_id: Uuid,
        settlement: &PayoutSettlement,
        now: DateTime<Utc>,
    ) -> ApiResult<Payout> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, PayoutRow>(&format!(
            "SELECT {} FROM payouts WHERE id = $1 FOR UPDATE",
            PAYOUT_COLUMNS
        ))
        .bind(payout_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Payout::from)
        .ok_or_else(|| ApiError::not_found(format!("Payout {} not found", payout_id)))?;

        if current.status != PayoutStatus::Pending {
            return Err(ApiError::conflict(format!(
                "Payout {} is already {}",
                payout_id,
                current.status.as_str()
            )));
        }

        let row = match settlement {
            PayoutSettlement::Completed { transfer_id } => {
                sqlx::query_as::<_, PayoutRow>(&format!(
                    r#"
                    UPDATE payouts SET status = 'COMPLETED', external_transfer_id = $2, completed_at = $3
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PAYOUT_COLUMNS
                ))
                .bind(payout_id)
                .bind(transfer_id)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
            PayoutSettlement::Failed { reason } => {
                Self::apply_wallet_delta(&mut tx, current.owner_id, current.amount).await?;
                sqlx::query_as::<_, PayoutRow>(&format!(
                    r#"
                    UPDATE payouts SET status = 'FAILED', failure_reason = $2
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PAYOUT_COLUMNS
                ))
                .bind(payout_id)
                .bind(reason)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        Ok(row.into())
    }

    async fn list_payouts(&self, owner_id: Uuid, limit: Option<i64>) -> ApiResult<Vec<Payout>> {
        let rows = sqlx::query_as::<_, PayoutRow>(&format!(
            "SELECT {} FROM payouts WHERE owner_id = $1 ORDER BY requested_at DESC, id DESC LIMIT $2",
            PAYOUT_COLUMNS
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_pending_payouts(&self) -> ApiResult<Vec<Payout>> {
        let rows = sqlx::query_as::<_, PayoutRow>(&format!(
            "SELECT {} FROM payouts WHERE status = 'PENDING' ORDER BY requested_at, id",
            PAYOUT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_report(&self, report: &Report) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reports (id, reporter_id, tool_id, booking_id, title, description, status,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(report.id)
        .bind(report.reporter_id)
        .bind(report.tool_id)
        .bind(report.booking_id)
        .bind(&report.title)
        .bind(&report.description)
        .bind(report.status.as_str())
        .bind(report.created_at)
        .bind(report.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_reports(&self, status: Option<ReportStatus>) -> ApiResult<Vec<Report>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM reports WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC, id DESC",
            REPORT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_report_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<Report>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "UPDATE reports SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            REPORT_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_report(&self, id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
