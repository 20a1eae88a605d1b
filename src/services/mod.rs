//! Core marketplace services.
//!
//! Each service is a set of free functions over a shared [`ServiceContext`]:
//! the store, the payment gateway, the clock and the booking policy. HTTP
//! handlers and tests call them the same way.

pub mod admission;
pub mod bookings;
pub mod gateway;
pub mod payments;
pub mod reports;
pub mod reputation;
pub mod reviews;
pub mod subscriptions;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::BookingPolicy;
use crate::domain::{Booking, Tool, User};
use crate::error::{ApiError, ApiResult};
use crate::store::Store;

pub use gateway::{PaymentGateway, SimulatedGateway, StripeGateway};

#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub clock: Arc<dyn Clock>,
    pub policy: BookingPolicy,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            policy,
        }
    }

    pub(crate) async fn booking(&self, id: uuid::Uuid) -> ApiResult<Booking> {
        self.store
            .get_booking(id)
            .await?
            .ok_or(ApiError::BookingNotFound(id))
    }

    pub(crate) async fn user(&self, id: uuid::Uuid) -> ApiResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or(ApiError::UserNotFound(id))
    }

    pub(crate) async fn tool(&self, id: uuid::Uuid) -> ApiResult<Tool> {
        self.store
            .get_tool(id)
            .await?
            .ok_or(ApiError::ToolNotFound(id))
    }
}
