use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl From<String> for PayoutStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Transfer of wallet funds to an owner's external account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payout {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub external_transfer_id: Option<String>,
    pub failure_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payout {
    pub fn pending(owner_id: Uuid, amount: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            amount,
            status: PayoutStatus::Pending,
            external_transfer_id: None,
            failure_reason: None,
            requested_at: now,
            completed_at: None,
        }
    }
}

/// How a reserved payout ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PayoutSettlement {
    Completed { transfer_id: String },
    /// The reserved amount goes back to the wallet.
    Failed { reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayoutRequest {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletResponse {
    pub owner_id: Uuid,
    pub balance: Decimal,
    pub recent_payouts: Vec<Payout>,
}

/// Outcome of one pass over payouts left PENDING by an unanswered transfer.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PayoutReconciliation {
    pub completed: Vec<Uuid>,
    pub failed: Vec<Uuid>,
    pub still_pending: Vec<Uuid>,
}
