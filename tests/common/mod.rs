//! Shared harness for the service-level tests.
//!
//! Everything runs against `MemoryStore`, a `FixedClock` and a gateway that
//! records what it was asked to do.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rstest::fixture;
use std::sync::Arc;
use uuid::Uuid;

use toolshed_backend::clock::{Clock, FixedClock};
use toolshed_backend::config::BookingPolicy;
use toolshed_backend::domain::bookings::CreateBookingRequest;
use toolshed_backend::domain::payments::{CheckoutParams, CheckoutSession};
use toolshed_backend::domain::{Booking, Tool, User, UserRole};
use toolshed_backend::error::{ApiError, ApiResult};
use toolshed_backend::services::gateway::{sign_payload, verify_stripe_signature};
use toolshed_backend::services::{admission, bookings, PaymentGateway, ServiceContext};
use toolshed_backend::store::{MemoryStore, Store};

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// How the next transfers misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFault {
    /// Refused outright; nothing moves.
    Declined,
    /// Executed by the provider, but the reply never arrives.
    ExecutedThenTimedOut,
    /// Lost before the provider saw it.
    LostInFlight,
}

/// Gateway double: records sessions and transfers, verifies real signatures.
pub struct MockGateway {
    pub sessions: Mutex<Vec<CheckoutParams>>,
    pub transfers: Mutex<Vec<(i64, String)>>,
    pub transfer_fault: Mutex<Option<TransferFault>>,
    clock: Arc<FixedClock>,
}

impl MockGateway {
    pub fn new(clock: Arc<FixedClock>) -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
            transfer_fault: Mutex::new(None),
            clock,
        }
    }

    pub fn fail_next_transfers(&self) {
        self.fault_transfers(TransferFault::Declined);
    }

    pub fn fault_transfers(&self, fault: TransferFault) {
        *self.transfer_fault.lock() = Some(fault);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, params: &CheckoutParams) -> ApiResult<CheckoutSession> {
        let mut sessions = self.sessions.lock();
        sessions.push(params.clone());
        let session_id = format!("cs_test_{}", sessions.len());
        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.test/{}", session_id),
            session_id,
        })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        verify_stripe_signature(payload, signature, WEBHOOK_SECRET, self.clock.now().timestamp())
            .is_ok()
    }

    async fn create_transfer(&self, amount_cents: i64, reference: &str) -> ApiResult<String> {
        let fault = *self.transfer_fault.lock();
        match fault {
            Some(TransferFault::Declined) => {
                return Err(ApiError::PaymentProcessing("card_declined".to_string()))
            }
            Some(TransferFault::LostInFlight) => {
                return Err(ApiError::PaymentOutcomeUnknown(
                    "operation timed out".to_string(),
                ))
            }
            Some(TransferFault::ExecutedThenTimedOut) | None => {}
        }

        let mut transfers = self.transfers.lock();
        transfers.push((amount_cents, reference.to_string()));
        if fault == Some(TransferFault::ExecutedThenTimedOut) {
            return Err(ApiError::PaymentOutcomeUnknown(
                "operation timed out".to_string(),
            ));
        }
        Ok(format!("tr_test_{}", transfers.len()))
    }

    async fn find_transfer(&self, reference: &str) -> ApiResult<Option<String>> {
        Ok(self
            .transfers
            .lock()
            .iter()
            .position(|(_, r)| r == reference)
            .map(|i| format!("tr_test_{}", i + 1)))
    }

    async fn health_check(&self) -> ApiResult<()> {
        Ok(())
    }
}

pub struct Harness {
    pub ctx: ServiceContext,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub gateway: Arc<MockGateway>,
}

/// Harness pinned to 2024-06-01 with the default booking policy.
#[fixture]
pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::on(date(2024, 6, 1)));
    let gateway = Arc::new(MockGateway::new(clock.clone()));

    let ctx = ServiceContext::new(
        store.clone(),
        gateway.clone(),
        clock.clone(),
        BookingPolicy::default(),
    );

    Harness {
        ctx,
        store,
        clock,
        gateway,
    }
}

/// Owner, renter and a 10/day tool owned by the owner.
pub struct Listing {
    pub owner: User,
    pub renter: User,
    pub tool: Tool,
}

impl Harness {
    pub async fn user(&self, name: &str) -> User {
        let user = User::new(name, format!("{}@toolshed.test", name), UserRole::Renter);
        self.store.insert_user(&user).await.unwrap();
        user
    }

    pub async fn listing(&self) -> Listing {
        let owner = self.user(&format!("owner-{}", Uuid::new_v4().simple())).await;
        let renter = self.user(&format!("renter-{}", Uuid::new_v4().simple())).await;
        let tool = Tool::new(owner.id, "Cordless drill", Decimal::from(10));
        self.store.insert_tool(&tool).await.unwrap();
        Listing {
            owner,
            renter,
            tool,
        }
    }

    pub async fn book(
        &self,
        listing: &Listing,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Booking> {
        let req = CreateBookingRequest {
            tool_id: listing.tool.id,
            renter_id: listing.renter.id,
            start_date: start,
            end_date: end,
        };
        admission::create_booking(&self.ctx, &req).await
    }

    /// Booking for June 5..7, approved, paid and then completed on June 8.
    pub async fn completed_booking(&self, listing: &Listing) -> Booking {
        let booking = self
            .book(listing, date(2024, 6, 5), date(2024, 6, 7))
            .await
            .unwrap();
        bookings::approve(&self.ctx, booking.id, listing.owner.id)
            .await
            .unwrap();
        toolshed_backend::services::payments::confirm_payment(&self.ctx, booking.id)
            .await
            .unwrap();
        self.clock.set(date(2024, 6, 8).and_hms_opt(12, 0, 0).unwrap().and_utc());
        bookings::complete(&self.ctx, booking.id).await.unwrap()
    }

    pub fn clock_unix(&self) -> i64 {
        self.clock.now().timestamp()
    }

    pub async fn wallet(&self, user_id: Uuid) -> Decimal {
        self.store
            .get_user(user_id)
            .await
            .unwrap()
            .unwrap()
            .wallet_balance
    }

    /// Signed `checkout.session.completed` delivery.
    pub fn signed_event(&self, event_id: &str, metadata: serde_json::Value) -> (Vec<u8>, String) {
        let payload = serde_json::json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": format!("cs_{}", event_id),
                "payment_status": "paid",
                "metadata": metadata,
            }}
        })
        .to_string()
        .into_bytes();
        let header = sign_payload(&payload, WEBHOOK_SECRET, self.clock_unix());
        (payload, header)
    }
}
