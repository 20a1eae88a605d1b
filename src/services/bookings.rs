//! Booking lifecycle orchestration.
//!
//! The rules live on `Booking`. Every mutation here is handed to the store as
//! a closure so it runs under the booking lock.

use tracing::instrument;
use uuid::Uuid;

use super::ServiceContext;
use crate::domain::bookings::{
    Booking, BookingStatus, CancelBookingResponse, ConditionReportRequest, SweepReport,
};
use crate::error::ApiResult;
use crate::store::{BookingFilter, PageWindow};

pub async fn get_booking(ctx: &ServiceContext, booking_id: Uuid) -> ApiResult<Booking> {
    ctx.booking(booking_id).await
}

/// One page of bookings, newest first, plus the total match count.
pub async fn list_bookings(
    ctx: &ServiceContext,
    filter: BookingFilter,
    window: PageWindow,
) -> ApiResult<(Vec<Booking>, u64)> {
    let total = ctx.store.count_bookings(&filter).await?;
    let bookings = ctx.store.list_bookings(&filter, Some(window)).await?;
    Ok((bookings, total))
}

#[instrument(skip(ctx))]
pub async fn approve(ctx: &ServiceContext, booking_id: Uuid, owner_id: Uuid) -> ApiResult<Booking> {
    let now = ctx.clock.now();
    let booking = ctx
        .store
        .transition_booking(booking_id, Box::new(move |b: &mut Booking| b.approve(owner_id, now)))
        .await?;

    tracing::info!(booking_id = %booking.id, "Booking approved");
    Ok(booking)
}

#[instrument(skip(ctx))]
pub async fn reject(ctx: &ServiceContext, booking_id: Uuid, owner_id: Uuid) -> ApiResult<Booking> {
    let now = ctx.clock.now();
    let booking = ctx
        .store
        .transition_booking(booking_id, Box::new(move |b: &mut Booking| b.reject(owner_id, now)))
        .await?;

    tracing::info!(booking_id = %booking.id, "Booking rejected");
    Ok(booking)
}

#[instrument(skip(ctx, req), fields(reporter_id = %req.reporter_id))]
pub async fn report_condition(
    ctx: &ServiceContext,
    booking_id: Uuid,
    req: ConditionReportRequest,
) -> ApiResult<Booking> {
    let now = ctx.clock.now();
    let deposit = ctx.policy.damage_deposit_amount;
    let ConditionReportRequest {
        reporter_id,
        condition_status,
        description,
    } = req;

    let booking = ctx
        .store
        .transition_booking(
            booking_id,
            Box::new(move |b: &mut Booking| {
                b.report_condition(reporter_id, condition_status, description, deposit, now)
            }),
        )
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        condition = condition_status.as_str(),
        deposit_status = booking.deposit_status.as_str(),
        "Condition reported"
    );
    Ok(booking)
}

/// Renter cancellation. Refund tiers and any wallet debit are applied in the
/// same store transaction as the status change.
#[instrument(skip(ctx))]
pub async fn cancel(
    ctx: &ServiceContext,
    booking_id: Uuid,
    renter_id: Uuid,
) -> ApiResult<CancelBookingResponse> {
    let now = ctx.clock.now();
    let booking = ctx
        .store
        .transition_booking(booking_id, Box::new(move |b: &mut Booking| b.cancel(renter_id, now)))
        .await?;

    let response = CancelBookingResponse::from(&booking);
    tracing::info!(
        booking_id = %booking.id,
        refund_amount = %response.refund_amount,
        refund_percentage = response.refund_percentage,
        "Booking cancelled"
    );
    Ok(response)
}

#[instrument(skip(ctx))]
pub async fn complete(ctx: &ServiceContext, booking_id: Uuid) -> ApiResult<Booking> {
    let now = ctx.clock.now();
    let booking = ctx
        .store
        .transition_booking(booking_id, Box::new(move |b: &mut Booking| b.complete(now)))
        .await?;

    tracing::info!(booking_id = %booking.id, "Booking completed");
    Ok(booking)
}

/// Advance APPROVED and ACTIVE bookings through their rental window.
///
/// Activates bookings whose window contains today and completes those whose
/// last day has passed. Each booking moves in its own transaction; a booking
/// that changed concurrently is skipped.
#[instrument(skip(ctx))]
pub async fn sweep_rental_periods(ctx: &ServiceContext) -> ApiResult<SweepReport> {
    let today = ctx.clock.today();
    let candidates = ctx
        .store
        .list_bookings(
            &BookingFilter::Statuses(vec![BookingStatus::Approved, BookingStatus::Active]),
            None,
        )
        .await?;

    let mut report = SweepReport::default();

    for booking in candidates {
        let now = ctx.clock.now();
        let id = booking.id;

        if booking.end_date < today {
            match ctx
                .store
                .transition_booking(id, Box::new(move |b: &mut Booking| b.complete(now)))
                .await
            {
                Ok(_) => report.completed.push(id),
                Err(e) => tracing::warn!(booking_id = %id, error = %e, "Skipped completion"),
            }
        } else if booking.status == BookingStatus::Approved && booking.start_date <= today {
            match ctx
                .store
                .transition_booking(id, Box::new(move |b: &mut Booking| b.activate(now)))
                .await
            {
                Ok(_) => report.activated.push(id),
                Err(e) => tracing::warn!(booking_id = %id, error = %e, "Skipped activation"),
            }
        }
    }

    tracing::info!(
        activated = report.activated.len(),
        completed = report.completed.len(),
        "Rental period sweep finished"
    );
    Ok(report)
}
