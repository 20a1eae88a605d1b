use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::users::{SubscriptionTier, User};

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatusResponse {
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Discount admission applies to this user's bookings.
    pub discount_percentage: Decimal,
}

impl SubscriptionStatusResponse {
    pub fn for_user(user: &User, now: DateTime<Utc>, pro_discount: Decimal) -> Self {
        let active = user.is_pro(now);
        Self {
            user_id: user.id,
            tier: user.subscription_tier,
            active,
            started_at: user.subscription_started_at,
            ends_at: user.subscription_ends_at,
            discount_percentage: if active { pro_discount } else { Decimal::ZERO },
        }
    }
}
