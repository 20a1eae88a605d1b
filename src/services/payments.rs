//! Payment orchestration.
//!
//! Opens gateway checkout sessions for rentals and deposits, reconciles
//! webhook deliveries and client confirmations against bookings, and runs
//! owner payouts. Settlement always goes through `Store::transition_booking`,
//! so a webhook racing a client confirmation credits the owner once.

use chrono::Duration;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use super::{subscriptions, ServiceContext};
use crate::domain::bookings::{Booking, BookingStatus, PaymentStatus};
use crate::domain::payments::{
    metadata, to_cents, CheckoutParams, CheckoutSession, CheckoutSessionRequest, GatewayEvent,
    PaymentStatusResponse, WebhookOutcome,
};
use crate::domain::payouts::{Payout, PayoutReconciliation, PayoutSettlement, WalletResponse};
use crate::domain::DepositStatus;
use crate::error::{ApiError, ApiResult};

/// Payouts shown on the wallet overview.
const RECENT_PAYOUTS: i64 = 10;

/// How long an unanswered transfer may stay unfound before its funds are
/// released. Must exceed the gateway's retry window.
pub const TRANSFER_LOOKUP_GRACE_MINUTES: i64 = 15;

/// Append `key=value` to a redirect URL, followed by the gateway's session
/// placeholder. The placeholder must stay unescaped.
pub(crate) fn redirect_url(base: &str, key: &str, value: &str) -> ApiResult<String> {
    let mut url = Url::parse(base)
        .map_err(|e| ApiError::internal(format!("Invalid redirect URL {}: {}", base, e)))?;
    url.query_pairs_mut().append_pair(key, value);
    Ok(format!("{}&session_id={{CHECKOUT_SESSION_ID}}", url))
}

fn cents(amount: Decimal) -> ApiResult<i64> {
    to_cents(amount).ok_or_else(|| ApiError::internal(format!("Amount {} out of range", amount)))
}

fn ensure_payable(booking: &Booking) -> ApiResult<()> {
    match booking.payment_status {
        PaymentStatus::Completed => return Err(ApiError::PaymentAlreadyCompleted(booking.id)),
        PaymentStatus::Refunded => {
            return Err(ApiError::InvalidTransition {
                action: "pay",
                state: PaymentStatus::Refunded.as_str().to_string(),
            })
        }
        PaymentStatus::Pending => {}
    }
    if matches!(
        booking.status,
        BookingStatus::Cancelled | BookingStatus::Rejected
    ) {
        return Err(ApiError::InvalidTransition {
            action: "pay",
            state: booking.status.to_string(),
        });
    }
    Ok(())
}

/// Open a checkout session for the rental price of a booking.
#[instrument(skip(ctx, req), fields(booking_id = %req.booking_id))]
pub async fn create_checkout_session(
    ctx: &ServiceContext,
    req: &CheckoutSessionRequest,
) -> ApiResult<CheckoutSession> {
    let booking = ctx.booking(req.booking_id).await?;
    ensure_payable(&booking)?;

    let amount_cents = cents(booking.total_price)?;
    if let Some(requested) = req.amount_in_cents {
        if requested != amount_cents {
            return Err(ApiError::bad_request(format!(
                "Amount {} does not match the booking total of {} cents",
                requested, amount_cents
            )));
        }
    }

    let booking_id = booking.id.to_string();
    let mut meta = BTreeMap::new();
    meta.insert(metadata::BOOKING_ID.to_string(), booking_id.clone());
    meta.insert(metadata::TYPE.to_string(), metadata::TYPE_RENTAL.to_string());

    let params = CheckoutParams {
        amount_cents,
        currency: ctx.policy.currency.clone(),
        product_name: "Tool rental".to_string(),
        description: req.description.clone().or_else(|| {
            Some(format!(
                "Rental from {} to {}",
                booking.start_date, booking.end_date
            ))
        }),
        success_url: redirect_url(&ctx.policy.checkout_success_url, metadata::BOOKING_ID, &booking_id)?,
        cancel_url: redirect_url(&ctx.policy.checkout_cancel_url, metadata::BOOKING_ID, &booking_id)?,
        metadata: meta,
        idempotency_key: format!("rental-{}-{}", booking.id, amount_cents),
    };

    let session = ctx.gateway.create_session(&params).await?;

    tracing::info!(
        booking_id = %booking.id,
        session_id = %session.session_id,
        amount_cents,
        "Checkout session created"
    );
    Ok(session)
}

/// Open a checkout session for the damage deposit of a booking.
#[instrument(skip(ctx))]
pub async fn create_deposit_checkout_session(
    ctx: &ServiceContext,
    booking_id: Uuid,
) -> ApiResult<CheckoutSession> {
    let booking = ctx.booking(booking_id).await?;
    if booking.deposit_status != DepositStatus::Required {
        return Err(ApiError::DepositNotRequired(booking.id));
    }

    let amount_cents = cents(booking.deposit_amount)?;
    let id = booking.id.to_string();
    let mut meta = BTreeMap::new();
    meta.insert(metadata::BOOKING_ID.to_string(), id.clone());
    meta.insert(metadata::TYPE.to_string(), metadata::TYPE_DEPOSIT.to_string());

    let params = CheckoutParams {
        amount_cents,
        currency: ctx.policy.currency.clone(),
        product_name: "Damage deposit".to_string(),
        description: booking
            .condition_status
            .map(|c| format!("Deposit for reported condition {}", c.as_str())),
        success_url: redirect_url(&ctx.policy.checkout_success_url, metadata::BOOKING_ID, &id)?,
        cancel_url: redirect_url(&ctx.policy.checkout_cancel_url, metadata::BOOKING_ID, &id)?,
        metadata: meta,
        idempotency_key: format!("deposit-{}-{}", booking.id, amount_cents),
    };

    let session = ctx.gateway.create_session(&params).await?;

    tracing::info!(
        booking_id = %booking.id,
        session_id = %session.session_id,
        amount_cents,
        "Deposit checkout session created"
    );
    Ok(session)
}

/// Record the rental payment. Fails with `PaymentAlreadyCompleted` on repeats.
#[instrument(skip(ctx))]
pub async fn confirm_payment(ctx: &ServiceContext, booking_id: Uuid) -> ApiResult<Booking> {
    let now = ctx.clock.now();
    let booking = ctx
        .store
        .transition_booking(booking_id, Box::new(move |b: &mut Booking| b.mark_paid(now)))
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        owner_id = %booking.owner_id,
        amount = %booking.total_price,
        "Payment recorded, owner credited"
    );
    Ok(booking)
}

/// Record the deposit payment on behalf of the renter.
#[instrument(skip(ctx))]
pub async fn confirm_deposit(
    ctx: &ServiceContext,
    booking_id: Uuid,
    renter_id: Uuid,
) -> ApiResult<Booking> {
    let now = ctx.clock.now();
    let booking = ctx
        .store
        .transition_booking(
            booking_id,
            Box::new(move |b: &mut Booking| {
                if b.renter_id != renter_id {
                    return Err(ApiError::forbidden("Only the renter can pay the deposit"));
                }
                b.mark_deposit_paid(now)
            }),
        )
        .await?;

    tracing::info!(booking_id = %booking.id, amount = %booking.deposit_amount, "Deposit recorded");
    Ok(booking)
}

async fn settle_deposit(ctx: &ServiceContext, booking_id: Uuid) -> ApiResult<Booking> {
    let now = ctx.clock.now();
    ctx.store
        .transition_booking(
            booking_id,
            Box::new(move |b: &mut Booking| b.mark_deposit_paid(now)),
        )
        .await
}

fn metadata_uuid(event: &GatewayEvent, key: &str) -> ApiResult<Uuid> {
    let raw = event
        .metadata(key)
        .ok_or_else(|| ApiError::bad_request(format!("Webhook metadata is missing {}", key)))?;
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::bad_request(format!("Webhook metadata {} is not a valid id", key)))
}

/// Verify and apply a gateway webhook delivery.
///
/// Replays of an already settled payment are acknowledged as
/// `AlreadySettled` so the gateway stops retrying. Payments for bookings
/// cancelled or rejected in the meantime are acknowledged as `Ignored` and
/// logged for a manual refund.
#[instrument(skip(ctx, payload, signature), fields(payload_len = payload.len()))]
pub async fn handle_webhook(
    ctx: &ServiceContext,
    payload: &[u8],
    signature: &str,
) -> ApiResult<WebhookOutcome> {
    if !ctx.gateway.verify_webhook_signature(payload, signature) {
        return Err(ApiError::InvalidSignature);
    }

    let event: GatewayEvent = serde_json::from_slice(payload)
        .map_err(|e| ApiError::bad_request(format!("Malformed webhook payload: {}", e)))?;

    if !event.is_paid_checkout() {
        tracing::debug!(event_type = %event.event_type, "Ignoring webhook event");
        return Ok(WebhookOutcome::Ignored);
    }

    if event.metadata(metadata::PAYMENT_TYPE) == Some(metadata::PRO_SUBSCRIPTION) {
        let user_id = metadata_uuid(&event, metadata::USER_ID)?;
        let already_active = ctx.user(user_id).await?.is_pro(ctx.clock.now());
        subscriptions::activate_pro(ctx, user_id, event.data.object.id.clone()).await?;
        return Ok(if already_active {
            WebhookOutcome::AlreadySettled
        } else {
            WebhookOutcome::Applied
        });
    }

    let booking_id = metadata_uuid(&event, metadata::BOOKING_ID)?;
    let result = if event.metadata(metadata::TYPE) == Some(metadata::TYPE_DEPOSIT) {
        settle_deposit(ctx, booking_id).await
    } else {
        confirm_payment(ctx, booking_id).await
    };

    match result {
        Ok(_) => Ok(WebhookOutcome::Applied),
        Err(ApiError::PaymentAlreadyCompleted(_)) | Err(ApiError::DepositNotRequired(_)) => {
            tracing::info!(booking_id = %booking_id, "Webhook replay for settled payment");
            Ok(WebhookOutcome::AlreadySettled)
        }
        Err(e @ ApiError::InvalidTransition { .. }) => {
            // Captured money for a booking that can no longer take it
            tracing::error!(
                booking_id = %booking_id,
                session_id = ?event.data.object.id,
                error = %e,
                "Paid checkout for a closed booking, refund required"
            );
            Ok(WebhookOutcome::Ignored)
        }
        Err(e) => Err(e),
    }
}

pub async fn payment_status(
    ctx: &ServiceContext,
    booking_id: Uuid,
) -> ApiResult<PaymentStatusResponse> {
    let booking = ctx.booking(booking_id).await?;
    Ok(PaymentStatusResponse::from(&booking))
}

// ============================================================================
// Wallet & payouts
// ============================================================================

pub async fn owner_wallet(ctx: &ServiceContext, owner_id: Uuid) -> ApiResult<WalletResponse> {
    let owner = ctx.user(owner_id).await?;
    let recent_payouts = ctx
        .store
        .list_payouts(owner_id, Some(RECENT_PAYOUTS))
        .await?;

    Ok(WalletResponse {
        owner_id,
        balance: owner.wallet_balance,
        recent_payouts,
    })
}

pub async fn payout_history(ctx: &ServiceContext, owner_id: Uuid) -> ApiResult<Vec<Payout>> {
    ctx.user(owner_id).await?;
    ctx.store.list_payouts(owner_id, None).await
}

/// Move `amount` from the owner's wallet to their external account.
///
/// The funds are reserved before the transfer is attempted. When the gateway
/// refuses the transfer the payout is marked FAILED, the funds go back and
/// the error is returned. When the outcome is unknown the payout stays
/// PENDING with the funds reserved until [`reconcile_pending_payouts`]
/// finds out what happened.
#[instrument(skip(ctx))]
pub async fn request_payout(
    ctx: &ServiceContext,
    owner_id: Uuid,
    amount: Decimal,
) -> ApiResult<Payout> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::InvalidPayout(
            "Payout amount must be positive".to_string(),
        ));
    }
    if amount.normalize().scale() > 2 {
        return Err(ApiError::InvalidPayout(
            "Payout amount cannot have more than two decimal places".to_string(),
        ));
    }
    ctx.user(owner_id).await?;

    let payout = Payout::pending(owner_id, amount, ctx.clock.now());
    ctx.store.reserve_payout(&payout).await?;

    let transfer = ctx
        .gateway
        .create_transfer(cents(amount)?, &payout.id.to_string())
        .await;

    match transfer {
        Ok(transfer_id) => {
            let settled = ctx
                .store
                .settle_payout(
                    payout.id,
                    &PayoutSettlement::Completed { transfer_id },
                    ctx.clock.now(),
                )
                .await?;
            tracing::info!(
                payout_id = %settled.id,
                owner_id = %owner_id,
                amount = %amount,
                "Payout completed"
            );
            Ok(settled)
        }
        Err(ApiError::PaymentOutcomeUnknown(reason)) => {
            tracing::warn!(
                payout_id = %payout.id,
                owner_id = %owner_id,
                reason = %reason,
                "Payout transfer unanswered, holding funds until reconciled"
            );
            Ok(payout)
        }
        Err(e) => {
            tracing::error!(payout_id = %payout.id, error = %e, "Payout transfer failed");
            let reason = e.to_string();
            if let Err(settle_err) = ctx
                .store
                .settle_payout(
                    payout.id,
                    &PayoutSettlement::Failed { reason },
                    ctx.clock.now(),
                )
                .await
            {
                tracing::error!(payout_id = %payout.id, error = %settle_err, "Failed to release payout funds");
            }
            Err(e)
        }
    }
}

/// Settle PENDING payouts by asking the gateway for the transfer made under
/// the payout id.
///
/// A transfer that turns up completes the payout. One still missing after
/// the grace period never happened, so the payout fails and the funds return
/// to the wallet. Lookup errors leave the payout for the next pass.
#[instrument(skip(ctx))]
pub async fn reconcile_pending_payouts(ctx: &ServiceContext) -> ApiResult<PayoutReconciliation> {
    let pending = ctx.store.list_pending_payouts().await?;
    let cutoff = ctx.clock.now() - Duration::minutes(TRANSFER_LOOKUP_GRACE_MINUTES);
    let mut report = PayoutReconciliation::default();

    for payout in pending {
        let found = match ctx.gateway.find_transfer(&payout.id.to_string()).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(payout_id = %payout.id, error = %e, "Transfer lookup failed");
                report.still_pending.push(payout.id);
                continue;
            }
        };

        let settlement = match found {
            Some(transfer_id) => PayoutSettlement::Completed { transfer_id },
            None if payout.requested_at <= cutoff => PayoutSettlement::Failed {
                reason: "Transfer was never created".to_string(),
            },
            None => {
                report.still_pending.push(payout.id);
                continue;
            }
        };

        match ctx
            .store
            .settle_payout(payout.id, &settlement, ctx.clock.now())
            .await
        {
            Ok(_) => match settlement {
                PayoutSettlement::Completed { .. } => report.completed.push(payout.id),
                PayoutSettlement::Failed { .. } => report.failed.push(payout.id),
            },
            Err(e) => {
                tracing::warn!(payout_id = %payout.id, error = %e, "Skipped payout settlement")
            }
        }
    }

    tracing::info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        still_pending = report.still_pending.len(),
        "Pending payouts reconciled"
    );
    Ok(report)
}
