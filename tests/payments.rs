mod common;

use chrono::Duration;
use rstest::rstest;
use serde_json::json;

use common::{date, dec, harness, Harness, TransferFault};
use toolshed_backend::domain::bookings::{ConditionReportRequest, DepositStatus, PaymentStatus};
use toolshed_backend::domain::payments::{CheckoutSessionRequest, WebhookOutcome};
use toolshed_backend::domain::{ConditionStatus, PayoutStatus, SubscriptionTier};
use toolshed_backend::error::ApiError;
use toolshed_backend::services::payments::TRANSFER_LOOKUP_GRACE_MINUTES;
use toolshed_backend::services::{bookings, payments, subscriptions};

fn checkout(booking_id: uuid::Uuid, amount_in_cents: Option<i64>) -> CheckoutSessionRequest {
    CheckoutSessionRequest {
        booking_id,
        amount_in_cents,
        description: None,
    }
}

#[rstest]
#[tokio::test]
async fn test_checkout_session_carries_booking_metadata(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, date(2024, 6, 10), date(2024, 6, 12))
        .await
        .unwrap();

    let session = payments::create_checkout_session(&h.ctx, &checkout(booking.id, None))
        .await
        .unwrap();
    assert_eq!(session.session_id, "cs_test_1");

    let sessions = h.gateway.sessions.lock();
    let params = &sessions[0];
    assert_eq!(params.amount_cents, 3000);
    assert_eq!(params.currency, "eur");
    assert_eq!(params.metadata["bookingId"], booking.id.to_string());
    assert_eq!(params.metadata["type"], "rental");
    assert!(params
        .success_url
        .ends_with("&session_id={CHECKOUT_SESSION_ID}"));
}

#[rstest]
#[tokio::test]
async fn test_checkout_rejects_mismatched_amount_and_paid_bookings(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, date(2024, 6, 10), date(2024, 6, 12))
        .await
        .unwrap();

    let wrong = payments::create_checkout_session(&h.ctx, &checkout(booking.id, Some(100))).await;
    assert!(matches!(wrong, Err(ApiError::BadRequest(_))));

    payments::confirm_payment(&h.ctx, booking.id).await.unwrap();
    let paid = payments::create_checkout_session(&h.ctx, &checkout(booking.id, Some(3000))).await;
    assert!(matches!(paid, Err(ApiError::PaymentAlreadyCompleted(_))));
    assert!(h.gateway.sessions.lock().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_mark_paid_credits_owner_once(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, date(2024, 6, 10), date(2024, 6, 12))
        .await
        .unwrap();

    let paid = payments::confirm_payment(&h.ctx, booking.id).await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Completed);
    assert!(paid.paid_at.is_some());

    let again = payments::confirm_payment(&h.ctx, booking.id).await;
    assert!(matches!(again, Err(ApiError::PaymentAlreadyCompleted(_))));
    assert_eq!(h.wallet(listing.owner.id).await, dec("30.00"));
}

#[rstest]
#[tokio::test]
async fn test_webhook_replay_is_acknowledged_without_double_credit(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, date(2024, 6, 10), date(2024, 6, 12))
        .await
        .unwrap();

    let (payload, signature) = h.signed_event(
        "evt_1",
        json!({"bookingId": booking.id.to_string(), "type": "rental"}),
    );

    let first = payments::handle_webhook(&h.ctx, &payload, &signature)
        .await
        .unwrap();
    assert_eq!(first, WebhookOutcome::Applied);

    let replay = payments::handle_webhook(&h.ctx, &payload, &signature)
        .await
        .unwrap();
    assert_eq!(replay, WebhookOutcome::AlreadySettled);

    // A client confirmation racing the webhook is also a no-op
    let client = payments::confirm_payment(&h.ctx, booking.id).await;
    assert!(matches!(client, Err(ApiError::PaymentAlreadyCompleted(_))));

    assert_eq!(h.wallet(listing.owner.id).await, dec("30.00"));
}

#[rstest]
#[tokio::test]
async fn test_webhook_and_client_confirmation_race_credits_once(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, date(2024, 6, 10), date(2024, 6, 12))
        .await
        .unwrap();
    bookings::approve(&h.ctx, booking.id, listing.owner.id)
        .await
        .unwrap();

    let (payload, signature) = h.signed_event(
        "evt_race",
        json!({"bookingId": booking.id.to_string(), "type": "rental"}),
    );

    let (webhook, client) = tokio::join!(
        payments::handle_webhook(&h.ctx, &payload, &signature),
        payments::confirm_payment(&h.ctx, booking.id),
    );

    let webhook = webhook.unwrap();
    let webhook_won = webhook == WebhookOutcome::Applied;
    let client_won = client.is_ok();
    assert!(webhook_won ^ client_won);
    if webhook_won {
        assert!(matches!(client, Err(ApiError::PaymentAlreadyCompleted(_))));
    } else {
        assert_eq!(webhook, WebhookOutcome::AlreadySettled);
    }

    assert_eq!(h.wallet(listing.owner.id).await, dec("30.00"));
    let status = payments::payment_status(&h.ctx, booking.id).await.unwrap();
    assert_eq!(status.payment_status, PaymentStatus::Completed);
}

#[rstest]
#[tokio::test]
async fn test_payment_for_rejected_booking_is_acknowledged(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, date(2024, 6, 10), date(2024, 6, 12))
        .await
        .unwrap();
    bookings::reject(&h.ctx, booking.id, listing.owner.id)
        .await
        .unwrap();

    let (payload, signature) = h.signed_event(
        "evt_late",
        json!({"bookingId": booking.id.to_string(), "type": "rental"}),
    );
    let outcome = payments::handle_webhook(&h.ctx, &payload, &signature)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let status = payments::payment_status(&h.ctx, booking.id).await.unwrap();
    assert_eq!(status.payment_status, PaymentStatus::Pending);
    assert_eq!(h.wallet(listing.owner.id).await, dec("0"));
}

#[rstest]
#[tokio::test]
async fn test_webhook_rejects_bad_signatures(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h
        .book(&listing, date(2024, 6, 10), date(2024, 6, 12))
        .await
        .unwrap();
    let (payload, signature) = h.signed_event(
        "evt_2",
        json!({"bookingId": booking.id.to_string(), "type": "rental"}),
    );

    let mut tampered = payload.clone();
    tampered.extend_from_slice(b" ");
    let result = payments::handle_webhook(&h.ctx, &tampered, &signature).await;
    assert!(matches!(result, Err(ApiError::InvalidSignature)));

    let result = payments::handle_webhook(&h.ctx, &payload, "t=1,v1=00").await;
    assert!(matches!(result, Err(ApiError::InvalidSignature)));

    let status = payments::payment_status(&h.ctx, booking.id).await.unwrap();
    assert_eq!(status.payment_status, PaymentStatus::Pending);
}

#[rstest]
#[tokio::test]
async fn test_unrelated_events_are_ignored(harness: Harness) {
    let h = harness;
    let payload = br#"{"id":"evt_3","type":"customer.created","data":{"object":{}}}"#;
    let signature = toolshed_backend::services::gateway::sign_payload(
        payload,
        common::WEBHOOK_SECRET,
        h.clock_unix(),
    );

    let outcome = payments::handle_webhook(&h.ctx, payload, &signature)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[rstest]
#[tokio::test]
async fn test_deposit_flow_after_damage_report(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    let booking = h.completed_booking(&listing).await;

    let early = payments::create_deposit_checkout_session(&h.ctx, booking.id).await;
    assert!(matches!(early, Err(ApiError::DepositNotRequired(_))));

    bookings::report_condition(
        &h.ctx,
        booking.id,
        ConditionReportRequest {
            reporter_id: listing.owner.id,
            condition_status: ConditionStatus::MissingParts,
            description: None,
        },
    )
    .await
    .unwrap();

    payments::create_deposit_checkout_session(&h.ctx, booking.id)
        .await
        .unwrap();
    let deposit_cents = h.gateway.sessions.lock()[0].amount_cents;
    assert_eq!(deposit_cents, 5000);

    let by_owner = payments::confirm_deposit(&h.ctx, booking.id, listing.owner.id).await;
    assert!(matches!(by_owner, Err(ApiError::Forbidden(_))));

    let (payload, signature) = h.signed_event(
        "evt_4",
        json!({"bookingId": booking.id.to_string(), "type": "deposit"}),
    );
    let outcome = payments::handle_webhook(&h.ctx, &payload, &signature)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    let status = payments::payment_status(&h.ctx, booking.id).await.unwrap();
    assert_eq!(status.deposit_status, DepositStatus::Paid);

    let again = payments::confirm_deposit(&h.ctx, booking.id, listing.renter.id).await;
    assert!(matches!(again, Err(ApiError::DepositNotRequired(_))));
}

#[rstest]
#[tokio::test]
async fn test_payout_moves_wallet_funds(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    h.completed_booking(&listing).await;
    assert_eq!(h.wallet(listing.owner.id).await, dec("30.00"));

    let payout = payments::request_payout(&h.ctx, listing.owner.id, dec("12.50"))
        .await
        .unwrap();
    assert_eq!(payout.status, PayoutStatus::Completed);
    assert_eq!(payout.external_transfer_id.as_deref(), Some("tr_test_1"));
    assert_eq!(h.gateway.transfers.lock()[0].0, 1250);
    assert_eq!(h.wallet(listing.owner.id).await, dec("17.50"));

    let too_much = payments::request_payout(&h.ctx, listing.owner.id, dec("20")).await;
    assert!(matches!(too_much, Err(ApiError::InsufficientBalance { .. })));

    let zero = payments::request_payout(&h.ctx, listing.owner.id, dec("0")).await;
    assert!(matches!(zero, Err(ApiError::InvalidPayout(_))));

    let wallet = payments::owner_wallet(&h.ctx, listing.owner.id).await.unwrap();
    assert_eq!(wallet.balance, dec("17.50"));
    assert_eq!(wallet.recent_payouts.len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_failed_transfer_returns_funds(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    h.completed_booking(&listing).await;
    h.gateway.fail_next_transfers();

    let result = payments::request_payout(&h.ctx, listing.owner.id, dec("30")).await;
    assert!(matches!(result, Err(ApiError::PaymentProcessing(_))));
    assert_eq!(h.wallet(listing.owner.id).await, dec("30.00"));

    let history = payments::payout_history(&h.ctx, listing.owner.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PayoutStatus::Failed);
    assert!(history[0].failure_reason.is_some());
}

#[rstest]
#[tokio::test]
async fn test_unanswered_transfer_keeps_funds_reserved(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    h.completed_booking(&listing).await;
    h.gateway.fault_transfers(TransferFault::ExecutedThenTimedOut);

    let payout = payments::request_payout(&h.ctx, listing.owner.id, dec("30"))
        .await
        .unwrap();
    assert_eq!(payout.status, PayoutStatus::Pending);
    assert_eq!(h.wallet(listing.owner.id).await, dec("0"));

    let again = payments::request_payout(&h.ctx, listing.owner.id, dec("30")).await;
    assert!(matches!(again, Err(ApiError::InsufficientBalance { .. })));
    assert_eq!(h.gateway.transfers.lock().len(), 1);

    let report = payments::reconcile_pending_payouts(&h.ctx).await.unwrap();
    assert_eq!(report.completed, vec![payout.id]);
    assert!(report.failed.is_empty());

    let history = payments::payout_history(&h.ctx, listing.owner.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PayoutStatus::Completed);
    assert_eq!(history[0].external_transfer_id.as_deref(), Some("tr_test_1"));
    assert_eq!(h.wallet(listing.owner.id).await, dec("0"));
}

#[rstest]
#[tokio::test]
async fn test_lost_transfer_is_released_after_grace_period(harness: Harness) {
    let h = harness;
    let listing = h.listing().await;
    h.completed_booking(&listing).await;
    h.gateway.fault_transfers(TransferFault::LostInFlight);

    let payout = payments::request_payout(&h.ctx, listing.owner.id, dec("30"))
        .await
        .unwrap();
    assert_eq!(payout.status, PayoutStatus::Pending);

    // Too early to rule the transfer out
    let early = payments::reconcile_pending_payouts(&h.ctx).await.unwrap();
    assert_eq!(early.still_pending, vec![payout.id]);
    assert_eq!(h.wallet(listing.owner.id).await, dec("0"));

    h.clock.advance(Duration::minutes(TRANSFER_LOOKUP_GRACE_MINUTES));
    let late = payments::reconcile_pending_payouts(&h.ctx).await.unwrap();
    assert_eq!(late.failed, vec![payout.id]);
    assert_eq!(h.wallet(listing.owner.id).await, dec("30.00"));

    *h.gateway.transfer_fault.lock() = None;
    let retried = payments::request_payout(&h.ctx, listing.owner.id, dec("30"))
        .await
        .unwrap();
    assert_eq!(retried.status, PayoutStatus::Completed);
    assert_eq!(h.gateway.transfers.lock().len(), 1);
    assert_eq!(h.wallet(listing.owner.id).await, dec("0"));
}

#[rstest]
#[tokio::test]
async fn test_pro_subscription_lifecycle(harness: Harness) {
    let h = harness;
    let user = h.user("maker").await;

    subscriptions::create_pro_checkout(&h.ctx, user.id)
        .await
        .unwrap();
    {
        let sessions = h.gateway.sessions.lock();
        assert_eq!(sessions[0].amount_cents, 2500);
        assert_eq!(sessions[0].metadata["paymentType"], "pro_subscription");
    }

    let (payload, signature) = h.signed_event(
        "evt_5",
        json!({"userId": user.id.to_string(), "paymentType": "pro_subscription"}),
    );
    let outcome = payments::handle_webhook(&h.ctx, &payload, &signature)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);
    let replay = payments::handle_webhook(&h.ctx, &payload, &signature)
        .await
        .unwrap();
    assert_eq!(replay, WebhookOutcome::AlreadySettled);

    let status = subscriptions::subscription_status(&h.ctx, user.id)
        .await
        .unwrap();
    assert_eq!(status.tier, SubscriptionTier::Pro);

    let second = subscriptions::create_pro_checkout(&h.ctx, user.id).await;
    assert!(matches!(second, Err(ApiError::Conflict(_))));

    let cancelled = subscriptions::cancel_subscription(&h.ctx, user.id)
        .await
        .unwrap();
    assert_eq!(cancelled.subscription_tier, SubscriptionTier::Free);
    let again = subscriptions::cancel_subscription(&h.ctx, user.id).await;
    assert!(matches!(again, Err(ApiError::Conflict(_))));
}
