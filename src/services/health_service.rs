use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the degraded flag while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    if state.is_degraded().await {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_state;

    use super::*;

    #[tokio::test]
    async fn reports_degraded_without_a_store() {
        let (state, _store) = test_state().await;
        assert_eq!(health_status(&state).await.status, "ok");

        state.clear_store().await;
        assert_eq!(health_status(&state).await.status, "degraded");
    }
}
