//! Booking entity and its lifecycle.
//!
//! Every transition is a method on `Booking` that validates the current state,
//! mutates the booking in place and reports the owner-wallet movement it
//! implies as a [`LedgerEffect`]. The store applies both together, so callers
//! never adjust balances on their own.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::tools::Tool;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Active,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether a booking in this state holds its dates on the tool calendar.
    pub fn blocks_calendar(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Rejected)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for BookingStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "APPROVED" => Self::Approved,
            "REJECTED" => Self::Rejected,
            "ACTIVE" => Self::Active,
            "COMPLETED" => Self::Completed,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "COMPLETED" => Self::Completed,
            "REFUNDED" => Self::Refunded,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    #[default]
    NotRequired,
    Required,
    Paid,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequired => "NOT_REQUIRED",
            Self::Required => "REQUIRED",
            Self::Paid => "PAID",
        }
    }
}

impl From<String> for DepositStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "REQUIRED" => Self::Required,
            "PAID" => Self::Paid,
            _ => Self::NotRequired,
        }
    }
}

/// Condition of the tool as reported after the rental.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionStatus {
    Ok,
    Used,
    MinorDamage,
    Broken,
    MissingParts,
}

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Used => "USED",
            Self::MinorDamage => "MINOR_DAMAGE",
            Self::Broken => "BROKEN",
            Self::MissingParts => "MISSING_PARTS",
        }
    }

    /// Conditions that make the renter owe a damage deposit.
    pub fn is_damage(&self) -> bool {
        matches!(self, Self::MinorDamage | Self::Broken | Self::MissingParts)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(Self::Ok),
            "USED" => Some(Self::Used),
            "MINOR_DAMAGE" => Some(Self::MinorDamage),
            "BROKEN" => Some(Self::Broken),
            "MISSING_PARTS" => Some(Self::MissingParts),
            _ => None,
        }
    }
}

/// Owner wallet movement produced by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerEffect {
    pub owner_wallet_delta: Decimal,
}

impl LedgerEffect {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn credit_owner(amount: Decimal) -> Self {
        Self {
            owner_wallet_delta: amount,
        }
    }

    pub fn debit_owner(amount: Decimal) -> Self {
        Self {
            owner_wallet_delta: -amount,
        }
    }

    pub fn is_none(&self) -> bool {
        self.owner_wallet_delta.is_zero()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub tool_id: Uuid,
    pub renter_id: Uuid,
    /// Copied from the tool at admission, never rewritten.
    pub owner_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub total_price: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub condition_status: Option<ConditionStatus>,
    pub condition_description: Option<String>,
    pub condition_reported_by: Option<Uuid>,
    pub condition_reported_at: Option<DateTime<Utc>>,
    pub deposit_status: DepositStatus,
    pub deposit_amount: Decimal,
    pub deposit_paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new_pending(
        tool: &Tool,
        renter_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        total_price: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_id: tool.id,
            renter_id,
            owner_id: tool.owner_id,
            start_date,
            end_date,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_price,
            paid_at: None,
            condition_status: None,
            condition_description: None,
            condition_reported_by: None,
            condition_reported_at: None,
            deposit_status: DepositStatus::NotRequired,
            deposit_amount: Decimal::ZERO,
            deposit_paid_at: None,
            cancelled_at: None,
            refund_amount: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Inclusive interval intersection against a blocking booking.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.status.blocks_calendar() && self.start_date <= end && self.end_date >= start
    }

    fn invalid(&self, action: &'static str) -> ApiError {
        ApiError::InvalidTransition {
            action,
            state: self.status.to_string(),
        }
    }

    fn require_owner(&self, actor: Uuid, action: &str) -> ApiResult<()> {
        if actor != self.owner_id {
            return Err(ApiError::forbidden(format!(
                "Only the tool owner can {} this booking",
                action
            )));
        }
        Ok(())
    }

    pub fn approve(&mut self, owner_id: Uuid, now: DateTime<Utc>) -> ApiResult<LedgerEffect> {
        self.require_owner(owner_id, "approve")?;
        if self.status != BookingStatus::Pending {
            return Err(self.invalid("approve"));
        }
        self.status = BookingStatus::Approved;
        self.updated_at = now;
        Ok(LedgerEffect::none())
    }

    pub fn reject(&mut self, owner_id: Uuid, now: DateTime<Utc>) -> ApiResult<LedgerEffect> {
        self.require_owner(owner_id, "reject")?;
        if self.status != BookingStatus::Pending {
            return Err(self.invalid("reject"));
        }
        self.status = BookingStatus::Rejected;
        self.updated_at = now;
        Ok(LedgerEffect::none())
    }

    /// APPROVED -> ACTIVE once today falls inside the rental window.
    pub fn activate(&mut self, now: DateTime<Utc>) -> ApiResult<LedgerEffect> {
        let today = now.date_naive();
        if self.status != BookingStatus::Approved {
            return Err(self.invalid("activate"));
        }
        if today < self.start_date || today > self.end_date {
            return Err(ApiError::conflict(format!(
                "Rental window {} to {} does not include {}",
                self.start_date, self.end_date, today
            )));
        }
        self.status = BookingStatus::Active;
        self.updated_at = now;
        Ok(LedgerEffect::none())
    }

    /// Settles the rental payment and credits the owner with the full price.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> ApiResult<LedgerEffect> {
        match self.payment_status {
            PaymentStatus::Completed => return Err(ApiError::PaymentAlreadyCompleted(self.id)),
            PaymentStatus::Refunded => {
                return Err(ApiError::InvalidTransition {
                    action: "pay",
                    state: PaymentStatus::Refunded.as_str().to_string(),
                })
            }
            PaymentStatus::Pending => {}
        }
        if matches!(
            self.status,
            BookingStatus::Rejected | BookingStatus::Cancelled
        ) {
            return Err(self.invalid("pay"));
        }

        self.payment_status = PaymentStatus::Completed;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(LedgerEffect::credit_owner(self.total_price))
    }

    pub fn report_condition(
        &mut self,
        reporter_id: Uuid,
        condition: ConditionStatus,
        description: Option<String>,
        damage_deposit: Decimal,
        now: DateTime<Utc>,
    ) -> ApiResult<LedgerEffect> {
        let today = now.date_naive();
        let rental_over = match self.status {
            BookingStatus::Completed => true,
            BookingStatus::Approved | BookingStatus::Active => today > self.end_date,
            _ => false,
        };
        if !rental_over {
            return Err(self.invalid("report condition on"));
        }
        if reporter_id != self.renter_id && reporter_id != self.owner_id {
            return Err(ApiError::forbidden(
                "Only the renter or the owner can report the tool condition",
            ));
        }
        if self.condition_status.is_some() {
            return Err(ApiError::conflict(
                "Condition has already been reported for this booking",
            ));
        }

        self.condition_status = Some(condition);
        self.condition_description = description;
        self.condition_reported_by = Some(reporter_id);
        self.condition_reported_at = Some(now);
        if condition.is_damage() {
            self.deposit_status = DepositStatus::Required;
            self.deposit_amount = damage_deposit;
        } else {
            self.deposit_status = DepositStatus::NotRequired;
            self.deposit_amount = Decimal::ZERO;
        }
        self.updated_at = now;
        Ok(LedgerEffect::none())
    }

    pub fn mark_deposit_paid(&mut self, now: DateTime<Utc>) -> ApiResult<LedgerEffect> {
        if self.deposit_status != DepositStatus::Required {
            return Err(ApiError::DepositNotRequired(self.id));
        }
        self.deposit_status = DepositStatus::Paid;
        self.deposit_paid_at = Some(now);
        self.updated_at = now;
        Ok(LedgerEffect::none())
    }

    /// Renter cancellation with a refund tiered by lead time.
    ///
    /// A paid booking hands the refunded share back out of the owner wallet.
    pub fn cancel(&mut self, renter_id: Uuid, now: DateTime<Utc>) -> ApiResult<LedgerEffect> {
        if renter_id != self.renter_id {
            return Err(ApiError::forbidden("Only the renter can cancel this booking"));
        }
        if !matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Approved
        ) {
            return Err(self.invalid("cancel"));
        }
        let today = now.date_naive();
        if today >= self.start_date {
            return Err(ApiError::InvalidTransition {
                action: "cancel",
                state: "already started".to_string(),
            });
        }

        let lead_days = (self.start_date - today).num_days();
        let refund = refund_amount(self.total_price, refund_percentage(lead_days));
        let was_paid = self.payment_status == PaymentStatus::Completed;

        if refund > Decimal::ZERO {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.refund_amount = Some(refund);
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;

        if was_paid && refund > Decimal::ZERO {
            Ok(LedgerEffect::debit_owner(refund))
        } else {
            Ok(LedgerEffect::none())
        }
    }

    /// APPROVED/ACTIVE -> COMPLETED once the last rental day is behind us.
    pub fn complete(&mut self, now: DateTime<Utc>) -> ApiResult<LedgerEffect> {
        if !matches!(self.status, BookingStatus::Approved | BookingStatus::Active) {
            return Err(self.invalid("complete"));
        }
        if self.end_date >= now.date_naive() {
            return Err(ApiError::conflict(format!(
                "Rental period ends on {} and has not passed yet",
                self.end_date
            )));
        }
        self.status = BookingStatus::Completed;
        self.updated_at = now;
        Ok(LedgerEffect::none())
    }

    /// Refund share actually granted, in whole percent.
    pub fn refund_percentage(&self) -> u32 {
        match self.refund_amount {
            Some(refund) if !self.total_price.is_zero() => {
                let pct = (refund * Decimal::from(100) / self.total_price)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
                pct.to_u32().unwrap_or(0)
            }
            _ => 0,
        }
    }
}

/// Rejects ranges that start or end in the past or run backwards.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> ApiResult<()> {
    if start < today || end < today {
        return Err(ApiError::InvalidDateRange(
            "Booking dates cannot be in the past".to_string(),
        ));
    }
    if end < start {
        return Err(ApiError::InvalidDateRange(
            "End date must be on or after start date".to_string(),
        ));
    }
    Ok(())
}

/// Days billed for a rental, both endpoints included.
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Price for `days` at `price_per_day`, with an optional percentage discount.
pub fn quote_price(price_per_day: Decimal, days: i64, discount_percentage: Option<Decimal>) -> Decimal {
    let base = price_per_day * Decimal::from(days);
    match discount_percentage {
        Some(pct) if pct > Decimal::ZERO => {
            let factor = Decimal::ONE - pct / Decimal::from(100);
            round_money(base * factor)
        }
        _ => round_money(base),
    }
}

/// 100% at a week or more, 50% at three days or more, nothing after that.
pub fn refund_percentage(days_until_start: i64) -> u32 {
    if days_until_start >= 7 {
        100
    } else if days_until_start >= 3 {
        50
    } else {
        0
    }
}

pub fn refund_amount(total: Decimal, percentage: u32) -> Decimal {
    round_money(total * Decimal::from(percentage) / Decimal::from(100))
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// Request / response DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub tool_id: Uuid,
    pub renter_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingQuote {
    pub tool_id: Uuid,
    pub days: i64,
    pub price_per_day: Decimal,
    pub base_price: Decimal,
    pub discount_percentage: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerDecisionRequest {
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionReportRequest {
    pub reporter_id: Uuid,
    pub condition_status: ConditionStatus,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelBookingRequest {
    pub renter_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelBookingResponse {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub refund_amount: Decimal,
    pub refund_percentage: u32,
    pub message: String,
}

impl From<&Booking> for CancelBookingResponse {
    fn from(b: &Booking) -> Self {
        let refund_amount = b.refund_amount.unwrap_or(Decimal::ZERO);
        let refund_percentage = b.refund_percentage();
        let message = if refund_amount > Decimal::ZERO {
            format!(
                "Booking cancelled. {}% refund of {} will be issued",
                refund_percentage, refund_amount
            )
        } else {
            "Booking cancelled. Cancellations less than 3 days before the start date are not refunded"
                .to_string()
        };

        Self {
            booking_id: b.id,
            status: b.status,
            payment_status: b.payment_status,
            refund_amount,
            refund_percentage,
            message,
        }
    }
}

/// Outcome of one sweep over the rental calendar.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub activated: Vec<Uuid>,
    pub completed: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day.and_hms_opt(9, 0, 0).unwrap())
    }

    fn booking(start: NaiveDate, end: NaiveDate) -> Booking {
        let tool = Tool::new(Uuid::new_v4(), "Drill", Decimal::from(10));
        Booking::new_pending(&tool, Uuid::new_v4(), start, end, Decimal::from(30), at(start))
    }

    #[test]
    fn test_price_for_three_days() {
        let days = rental_days(date(2024, 6, 1), date(2024, 6, 3));
        assert_eq!(days, 3);
        assert_eq!(quote_price(Decimal::from(10), days, None), Decimal::from(30));
    }

    #[test]
    fn test_pro_discount_rounds_to_cents() {
        let total = quote_price(Decimal::from(10), 3, Some(Decimal::from(5)));
        assert_eq!(total, Decimal::new(2850, 2));

        // 3 * 3.33 = 9.99, 5% off = 9.4905 -> 9.49
        let total = quote_price(Decimal::new(333, 2), 3, Some(Decimal::from(5)));
        assert_eq!(total, Decimal::new(949, 2));
    }

    #[test]
    fn test_date_validation() {
        let today = date(2024, 6, 1);
        assert!(validate_date_range(today, today, today).is_ok());
        assert!(matches!(
            validate_date_range(date(2024, 5, 31), today, today),
            Err(ApiError::InvalidDateRange(_))
        ));
        assert!(matches!(
            validate_date_range(date(2024, 6, 5), date(2024, 6, 4), today),
            Err(ApiError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn test_inclusive_overlap() {
        let b = booking(date(2024, 6, 1), date(2024, 6, 3));
        assert!(b.overlaps(date(2024, 6, 3), date(2024, 6, 5)));
        assert!(b.overlaps(date(2024, 5, 28), date(2024, 6, 1)));
        assert!(!b.overlaps(date(2024, 6, 4), date(2024, 6, 6)));

        let mut cancelled = b.clone();
        cancelled.status = BookingStatus::Cancelled;
        assert!(!cancelled.overlaps(date(2024, 6, 1), date(2024, 6, 3)));
    }

    #[test]
    fn test_refund_tiers() {
        assert_eq!(refund_percentage(10), 100);
        assert_eq!(refund_percentage(7), 100);
        assert_eq!(refund_percentage(5), 50);
        assert_eq!(refund_percentage(3), 50);
        assert_eq!(refund_percentage(1), 0);
    }

    #[test]
    fn test_only_owner_approves() {
        let mut b = booking(date(2024, 6, 10), date(2024, 6, 12));
        let now = at(date(2024, 6, 1));

        assert!(matches!(
            b.approve(b.renter_id, now),
            Err(ApiError::Forbidden(_))
        ));
        b.approve(b.owner_id, now).unwrap();
        assert_eq!(b.status, BookingStatus::Approved);

        assert!(matches!(
            b.reject(b.owner_id, now),
            Err(ApiError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_mark_paid_credits_once() {
        let mut b = booking(date(2024, 6, 10), date(2024, 6, 12));
        let now = at(date(2024, 6, 1));

        let effect = b.mark_paid(now).unwrap();
        assert_eq!(effect, LedgerEffect::credit_owner(Decimal::from(30)));
        assert_eq!(b.payment_status, PaymentStatus::Completed);

        assert!(matches!(
            b.mark_paid(now),
            Err(ApiError::PaymentAlreadyCompleted(id)) if id == b.id
        ));
        assert_eq!(b.payment_status, PaymentStatus::Completed);
    }

    #[test]
    fn test_cancel_paid_booking_debits_owner() {
        let mut b = booking(date(2024, 6, 11), date(2024, 6, 13));
        let now = at(date(2024, 6, 1));
        b.mark_paid(now).unwrap();

        let effect = b.cancel(b.renter_id, now).unwrap();
        assert_eq!(effect, LedgerEffect::debit_owner(Decimal::from(30)));
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.payment_status, PaymentStatus::Refunded);
        assert_eq!(b.refund_percentage(), 100);
    }

    #[test]
    fn test_late_cancel_keeps_payment_status() {
        let mut b = booking(date(2024, 6, 2), date(2024, 6, 3));
        let effect = b.cancel(b.renter_id, at(date(2024, 6, 1))).unwrap();

        assert!(effect.is_none());
        assert_eq!(b.refund_amount, Some(Decimal::ZERO));
        assert_eq!(b.payment_status, PaymentStatus::Pending);
        assert_eq!(b.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_cancel_on_start_day_is_refused() {
        let mut b = booking(date(2024, 6, 1), date(2024, 6, 3));
        assert!(matches!(
            b.cancel(b.renter_id, at(date(2024, 6, 1))),
            Err(ApiError::InvalidTransition { .. })
        ));
        assert!(matches!(
            b.cancel(b.owner_id, at(date(2024, 5, 1))),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_damage_requires_deposit() {
        let mut b = booking(date(2024, 6, 1), date(2024, 6, 3));
        b.status = BookingStatus::Completed;
        let now = at(date(2024, 6, 4));

        b.report_condition(b.owner_id, ConditionStatus::Broken, None, Decimal::from(50), now)
            .unwrap();
        assert_eq!(b.deposit_status, DepositStatus::Required);
        assert_eq!(b.deposit_amount, Decimal::from(50));

        assert!(matches!(
            b.report_condition(b.renter_id, ConditionStatus::Ok, None, Decimal::from(50), now),
            Err(ApiError::Conflict(_))
        ));

        b.mark_deposit_paid(now).unwrap();
        assert_eq!(b.deposit_status, DepositStatus::Paid);
        assert!(matches!(
            b.mark_deposit_paid(now),
            Err(ApiError::DepositNotRequired(_))
        ));
    }

    #[test]
    fn test_condition_report_waits_for_rental_end() {
        let mut b = booking(date(2024, 6, 1), date(2024, 6, 3));
        b.status = BookingStatus::Active;
        let err = b
            .report_condition(
                b.renter_id,
                ConditionStatus::Ok,
                None,
                Decimal::from(50),
                at(date(2024, 6, 3)),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidTransition { .. }));
    }

    #[test]
    fn test_complete_after_end_date() {
        let mut b = booking(date(2024, 6, 1), date(2024, 6, 3));
        b.status = BookingStatus::Active;

        assert!(b.complete(at(date(2024, 6, 3))).is_err());
        b.complete(at(date(2024, 6, 4))).unwrap();
        assert_eq!(b.status, BookingStatus::Completed);
    }
}
