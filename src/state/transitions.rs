use crate::{
    error::ServiceError,
    services::sse_events::broadcast_session_snapshot,
    state::{SharedState, state_machine::SessionEvent},
};

/// Execute a planned lifecycle transition, then broadcast the resulting session snapshot.
pub async fn run_transition_with_broadcast<F, Fut, T>(
    state: &SharedState,
    event: SessionEvent,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let (res, _next) = state.run_transition(event, work).await?;
    broadcast_session_snapshot(state).await;
    Ok(res)
}
