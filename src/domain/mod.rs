//! Domain types and DTOs
//!
//! Entities of the rental marketplace plus the pure rules that govern them.
//! Nothing in here touches storage or the network.

pub mod bookings;
pub mod earnings;
pub mod payments;
pub mod payouts;
pub mod reports;
pub mod reviews;
pub mod subscriptions;
pub mod tools;
pub mod users;

// Re-export commonly used types
pub use bookings::{Booking, BookingStatus, ConditionStatus, DepositStatus, LedgerEffect, PaymentStatus};
pub use payouts::{Payout, PayoutSettlement, PayoutStatus};
pub use reports::{Report, ReportStatus};
pub use reviews::{Review, ReviewTarget, ReviewType};
pub use tools::{RatingSummary, Tool};
pub use users::{SubscriptionTier, SubscriptionUpdate, User, UserRole};
