use axum::{extract::State, response::Json};
use tracing::info;

use crate::handlers::AppState;
use crate::models::HealthDetails;

/// Liveness probe.
pub async fn health_handler() -> &'static str {
    "OK"
}

pub async fn health_details_handler(State(state): State<AppState>) -> Json<HealthDetails> {
    let rate_limiting = state.limiter.stats();

    info!(
        total_requests = rate_limiting.total_requests,
        rejected_requests = rate_limiting.rejected_requests,
        available_permits = rate_limiting.available_permits,
        "Health check completed"
    );

    Json(HealthDetails {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        rate_limiting,
    })
}
