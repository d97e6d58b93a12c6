use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the challenge store and report coarse service health.
///
/// A missing or failing store means results cannot be persisted, so the
/// endpoint reports degraded even before the supervisor has flipped the flag.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.challenge_store().await else {
        warn!("challenge store not installed, reporting degraded");
        return HealthResponse::degraded();
    };

    if let Err(err) = store.health_check().await {
        warn!(error = %err, "challenge store health check failed");
        return HealthResponse::degraded();
    }

    if state.is_degraded() {
        return HealthResponse::degraded();
    }

    HealthResponse::ok()
}
