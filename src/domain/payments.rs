//! Payment types shared by the orchestrator and the gateway adapters.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::bookings::{Booking, DepositStatus, PaymentStatus};

/// Metadata keys the gateway echoes back on webhooks.
pub mod metadata {
    pub const BOOKING_ID: &str = "bookingId";
    pub const USER_ID: &str = "userId";
    pub const TYPE: &str = "type";
    pub const PAYMENT_TYPE: &str = "paymentType";

    pub const TYPE_RENTAL: &str = "rental";
    pub const TYPE_DEPOSIT: &str = "deposit";
    pub const PRO_SUBSCRIPTION: &str = "pro_subscription";
}

pub const CHECKOUT_COMPLETED_EVENT: &str = "checkout.session.completed";

/// Everything a gateway needs to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutParams {
    pub amount_cents: i64,
    pub currency: String,
    pub product_name: String,
    pub description: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
    /// Sent as `Idempotency-Key` so a retried request opens one session.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
}

/// Webhook envelope as posted by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub object: CheckoutSessionObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl GatewayEvent {
    pub fn is_paid_checkout(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED_EVENT
            && self.data.object.payment_status.as_deref() == Some("paid")
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.data.object.metadata.get(key).map(String::as_str)
    }
}

/// What a webhook delivery did to local state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    AlreadySettled,
    Ignored,
}

impl WebhookOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Applied => "Payment recorded",
            Self::AlreadySettled => "Payment already settled",
            Self::Ignored => "Event ignored",
        }
    }
}

/// Convert a euro amount to integer cents.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).round().to_i64()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionRequest {
    pub booking_id: Uuid,
    #[serde(default)]
    pub amount_in_cents: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositConfirmRequest {
    pub renter_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusResponse {
    pub booking_id: Uuid,
    pub payment_status: PaymentStatus,
    pub total_price: Decimal,
    pub deposit_status: DepositStatus,
    pub deposit_amount: Decimal,
}

impl From<&Booking> for PaymentStatusResponse {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.id,
            payment_status: b.payment_status,
            total_price: b.total_price,
            deposit_status: b.deposit_status,
            deposit_amount: b.deposit_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
    pub message: &'static str,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        Self {
            received: true,
            outcome,
            message: outcome.message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completed_checkout() {
        let payload = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "metadata": {"bookingId": "6b1f0d5e-93a4-4c55-9f3b-2d1f1c1e8f00", "type": "rental"}
            }}
        }"#;

        let event: GatewayEvent = serde_json::from_str(payload).unwrap();
        assert!(event.is_paid_checkout());
        assert_eq!(event.metadata(metadata::TYPE), Some("rental"));
    }

    #[test]
    fn test_unpaid_checkout_is_not_actionable() {
        let payload = r#"{"type": "checkout.session.completed",
            "data": {"object": {"payment_status": "unpaid"}}}"#;
        let event: GatewayEvent = serde_json::from_str(payload).unwrap();
        assert!(!event.is_paid_checkout());
    }

    #[test]
    fn test_to_cents() {
        assert_eq!(to_cents(Decimal::new(2850, 2)), Some(2850));
        assert_eq!(to_cents(Decimal::from(50)), Some(5000));
    }
}
