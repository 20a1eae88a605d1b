use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reputation assigned to users nobody has reviewed yet.
pub const DEFAULT_REPUTATION: f64 = 5.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Renter,
    Supplier,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Renter => "RENTER",
            Self::Supplier => "SUPPLIER",
        }
    }
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ADMIN" => Self::Admin,
            "SUPPLIER" => Self::Supplier,
            _ => Self::Renter,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl From<String> for UserStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "INACTIVE" => Self::Inactive,
            _ => Self::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
        }
    }
}

impl From<String> for SubscriptionTier {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PRO" => Self::Pro,
            _ => Self::Free,
        }
    }
}

/// Marketplace member. The same account can rent tools and list its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub reputation_score: f64,
    pub wallet_balance: Decimal,
    pub subscription_tier: SubscriptionTier,
    pub subscription_started_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub subscription_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role,
            status: UserStatus::Active,
            reputation_score: DEFAULT_REPUTATION,
            wallet_balance: Decimal::ZERO,
            subscription_tier: SubscriptionTier::Free,
            subscription_started_at: None,
            subscription_ends_at: None,
            subscription_reference: None,
            created_at: Utc::now(),
        }
    }

    /// PRO tier with no end date or an end date still ahead of `now`.
    pub fn is_pro(&self, now: DateTime<Utc>) -> bool {
        self.subscription_tier == SubscriptionTier::Pro
            && self.subscription_ends_at.map_or(true, |ends| ends > now)
    }
}

/// Subscription state written back by activation and cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionUpdate {
    pub tier: SubscriptionTier,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub reference: Option<String>,
}
