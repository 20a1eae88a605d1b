//! Booking admission: date sanity, pricing and calendar reservation.

use rust_decimal::Decimal;
use tracing::instrument;

use super::ServiceContext;
use crate::domain::bookings::{
    quote_price, rental_days, round_money, validate_date_range, Booking, BookingQuote,
    CreateBookingRequest,
};
use crate::domain::{Tool, User};
use crate::error::{ApiError, ApiResult};

struct Admissible {
    tool: Tool,
    quote: BookingQuote,
}

async fn check_request(ctx: &ServiceContext, req: &CreateBookingRequest) -> ApiResult<Admissible> {
    validate_date_range(req.start_date, req.end_date, ctx.clock.today())?;

    let tool = ctx.tool(req.tool_id).await?;
    let renter: User = ctx
        .store
        .get_user(req.renter_id)
        .await?
        .ok_or(ApiError::RenterNotFound(req.renter_id))?;

    if !tool.active {
        return Err(ApiError::bad_request("Tool is not available for rent"));
    }
    if tool.owner_id == renter.id {
        return Err(ApiError::bad_request("You cannot book your own tool"));
    }

    let discount = if renter.is_pro(ctx.clock.now()) {
        ctx.policy.pro_discount_percentage
    } else {
        Decimal::ZERO
    };

    let days = rental_days(req.start_date, req.end_date);
    let quote = BookingQuote {
        tool_id: tool.id,
        days,
        price_per_day: tool.price_per_day,
        base_price: round_money(tool.price_per_day * Decimal::from(days)),
        discount_percentage: discount,
        total_price: quote_price(tool.price_per_day, days, Some(discount)),
    };

    Ok(Admissible { tool, quote })
}

/// Price a prospective booking without reserving anything.
#[instrument(skip(ctx, req), fields(tool_id = %req.tool_id, renter_id = %req.renter_id))]
pub async fn quote_booking(ctx: &ServiceContext, req: &CreateBookingRequest) -> ApiResult<BookingQuote> {
    Ok(check_request(ctx, req).await?.quote)
}

/// Admit a booking request and persist it as PENDING.
#[instrument(skip(ctx, req), fields(tool_id = %req.tool_id, renter_id = %req.renter_id))]
pub async fn create_booking(ctx: &ServiceContext, req: &CreateBookingRequest) -> ApiResult<Booking> {
    let Admissible { tool, quote } = check_request(ctx, req).await?;

    let booking = Booking::new_pending(
        &tool,
        req.renter_id,
        req.start_date,
        req.end_date,
        quote.total_price,
        ctx.clock.now(),
    );
    ctx.store.insert_booking_if_available(&booking).await?;

    tracing::info!(
        booking_id = %booking.id,
        start_date = %booking.start_date,
        end_date = %booking.end_date,
        total_price = %booking.total_price,
        discount = %quote.discount_percentage,
        "Booking created"
    );

    Ok(booking)
}
