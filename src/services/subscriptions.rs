//! Pro membership: checkout, activation and cancellation.

use std::collections::BTreeMap;
use tracing::instrument;
use uuid::Uuid;

use super::payments::redirect_url;
use super::ServiceContext;
use crate::domain::payments::{metadata, to_cents, CheckoutParams, CheckoutSession};
use crate::domain::subscriptions::SubscriptionStatusResponse;
use crate::domain::{SubscriptionTier, SubscriptionUpdate, User};
use crate::error::{ApiError, ApiResult};

pub async fn subscription_status(
    ctx: &ServiceContext,
    user_id: Uuid,
) -> ApiResult<SubscriptionStatusResponse> {
    let user = ctx.user(user_id).await?;
    Ok(SubscriptionStatusResponse::for_user(
        &user,
        ctx.clock.now(),
        ctx.policy.pro_discount_percentage,
    ))
}

#[instrument(skip(ctx))]
pub async fn create_pro_checkout(ctx: &ServiceContext, user_id: Uuid) -> ApiResult<CheckoutSession> {
    let user = ctx.user(user_id).await?;
    if user.is_pro(ctx.clock.now()) {
        return Err(ApiError::conflict("User already has an active Pro subscription"));
    }

    let amount_cents = to_cents(ctx.policy.pro_price)
        .ok_or_else(|| ApiError::internal("Pro price out of range"))?;
    let id = user.id.to_string();

    let mut meta = BTreeMap::new();
    meta.insert(metadata::USER_ID.to_string(), id.clone());
    meta.insert(
        metadata::PAYMENT_TYPE.to_string(),
        metadata::PRO_SUBSCRIPTION.to_string(),
    );

    let params = CheckoutParams {
        amount_cents,
        currency: ctx.policy.currency.clone(),
        product_name: "Toolshed Pro".to_string(),
        description: Some(format!(
            "{}% off every rental",
            ctx.policy.pro_discount_percentage
        )),
        success_url: redirect_url(&ctx.policy.checkout_success_url, metadata::USER_ID, &id)?,
        cancel_url: redirect_url(&ctx.policy.checkout_cancel_url, metadata::USER_ID, &id)?,
        metadata: meta,
        idempotency_key: format!("pro-{}-{}", user.id, ctx.clock.today()),
    };

    let session = ctx.gateway.create_session(&params).await?;
    tracing::info!(user_id = %user.id, session_id = %session.session_id, "Pro checkout created");
    Ok(session)
}

/// Turn on PRO for a user. Already active members are left untouched.
#[instrument(skip(ctx))]
pub async fn activate_pro(
    ctx: &ServiceContext,
    user_id: Uuid,
    reference: Option<String>,
) -> ApiResult<User> {
    let user = ctx.user(user_id).await?;
    let now = ctx.clock.now();
    if user.is_pro(now) {
        return Ok(user);
    }

    let update = SubscriptionUpdate {
        tier: SubscriptionTier::Pro,
        started_at: Some(now),
        ends_at: None,
        reference,
    };
    let user = ctx.store.update_subscription(user_id, &update).await?;

    tracing::info!(user_id = %user.id, "Pro subscription activated");
    Ok(user)
}

#[instrument(skip(ctx))]
pub async fn cancel_subscription(ctx: &ServiceContext, user_id: Uuid) -> ApiResult<User> {
    let user = ctx.user(user_id).await?;
    if user.subscription_tier != SubscriptionTier::Pro {
        return Err(ApiError::conflict("User has no Pro subscription to cancel"));
    }

    let update = SubscriptionUpdate {
        tier: SubscriptionTier::Free,
        started_at: user.subscription_started_at,
        ends_at: Some(ctx.clock.now()),
        reference: None,
    };
    let user = ctx.store.update_subscription(user_id, &update).await?;

    tracing::info!(user_id = %user.id, "Pro subscription cancelled");
    Ok(user)
}
