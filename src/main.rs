use anyhow::Result;
use std::sync::Arc;

use toolshed_backend::{
    app,
    clock::SystemClock,
    config, db, logging,
    services::{payments, reputation, PaymentGateway, ServiceContext, SimulatedGateway, StripeGateway},
    store::PgStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;

    logging::init_logging(&settings);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting Toolshed backend"
    );

    let pool = db::connect_and_migrate(&settings).await?;

    let gateway: Arc<dyn PaymentGateway> = match &settings.stripe_secret_key {
        Some(secret_key) => Arc::new(StripeGateway::new(
            &settings.stripe_api_base,
            secret_key,
            &settings.stripe_webhook_secret,
            settings.stripe_payout_destination.clone(),
            &settings.booking_policy.currency,
            settings.payment_timeout_seconds,
        )?),
        None => Arc::new(SimulatedGateway::new(&settings.stripe_webhook_secret)),
    };

    let ctx = ServiceContext::new(
        Arc::new(PgStore::new(pool)),
        gateway,
        Arc::new(SystemClock),
        settings.booking_policy.clone(),
    );

    // Reviews written while the service was down are folded in here
    match reputation::recalculate_all_reputations(&ctx).await {
        Ok(users) => tracing::info!(users, "Startup reputation recalculation finished"),
        Err(e) => tracing::warn!(error = %e, "Startup reputation recalculation failed"),
    }

    // Payouts whose transfer went unanswered before the last shutdown
    if let Err(e) = payments::reconcile_pending_payouts(&ctx).await {
        tracing::warn!(error = %e, "Startup payout reconciliation failed");
    }

    let state = app::AppState::new(ctx, settings.clone());
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
