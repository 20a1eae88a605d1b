use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::api::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::error::ApiError;
use crate::services::{payments, reputation};

/// POST /admin/reputations/recalculate
///
/// Recompute every user's reputation from the full review history.
pub async fn recalculate_reputations(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = reputation::recalculate_all_reputations(&state.ctx).await?;
    Ok(MessageResponse::new(
        "REPUTATIONS_RECALCULATED",
        format!("Recalculated reputation for {} users", updated),
    ))
}

/// POST /admin/payouts/reconcile
pub async fn reconcile_payouts(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = payments::reconcile_pending_payouts(&state.ctx).await?;
    Ok(DataResponse::new(report))
}
