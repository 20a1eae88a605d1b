pub mod admin;
pub mod bookings;
pub mod health;
pub mod owners;
pub mod payments;
pub mod reports;
pub mod reviews;
pub mod subscriptions;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        // Bookings
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/quote", post(bookings::quote_booking))
        .route("/bookings/sweep", post(bookings::sweep_rental_periods))
        .route("/bookings/:booking_id", get(bookings::get_booking))
        .route("/bookings/:booking_id/approve", post(bookings::approve_booking))
        .route("/bookings/:booking_id/reject", post(bookings::reject_booking))
        .route(
            "/bookings/:booking_id/condition-report",
            post(bookings::report_condition),
        )
        .route("/bookings/:booking_id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:booking_id/complete", post(bookings::complete_booking))
        .route("/bookings/:booking_id/reviews", get(reviews::list_booking_reviews))
        .route("/tools/:tool_id/bookings", get(bookings::list_tool_bookings))
        .route("/renters/:renter_id/bookings", get(bookings::list_renter_bookings))
        // Payments
        .route(
            "/payments/checkout-session",
            post(payments::create_checkout_session),
        )
        .route(
            "/payments/bookings/:booking_id/deposit-session",
            post(payments::create_deposit_session),
        )
        .route(
            "/payments/bookings/:booking_id/mark-paid",
            post(payments::mark_paid),
        )
        .route(
            "/payments/bookings/:booking_id/deposit/mark-paid",
            post(payments::mark_deposit_paid),
        )
        .route(
            "/payments/bookings/:booking_id/status",
            get(payments::payment_status),
        )
        .route("/payments/webhook", post(payments::webhook))
        // Owners
        .route("/owners/:owner_id/bookings", get(owners::list_owner_bookings))
        .route("/owners/:owner_id/earnings", get(owners::monthly_earnings))
        .route("/owners/:owner_id/wallet", get(owners::wallet))
        .route(
            "/owners/:owner_id/payouts",
            get(owners::payout_history).post(owners::request_payout),
        )
        // Reviews
        .route("/reviews", post(reviews::create_review))
        .route("/reviews/:review_id", put(reviews::update_review))
        // Reports
        .route(
            "/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/reports/:report_id",
            patch(reports::update_report_status).delete(reports::delete_report),
        )
        // Subscriptions
        .route(
            "/subscriptions/:user_id",
            get(subscriptions::subscription_status)
                .post(subscriptions::create_pro_checkout)
                .delete(subscriptions::cancel_subscription),
        )
        // Admin
        .route(
            "/admin/reputations/recalculate",
            post(admin::recalculate_reputations),
        )
        .route("/admin/payouts/reconcile", post(admin::reconcile_payouts))
}
