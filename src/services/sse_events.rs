use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        session::SessionSnapshotResponse,
        sse::{ServerEvent, SystemStatus},
    },
    state::SharedState,
};

const EVENT_SESSION_SNAPSHOT: &str = "session.snapshot";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Build the scoreboard projection served over REST and SSE.
pub async fn session_snapshot(state: &SharedState) -> SessionSnapshotResponse {
    let phase = state.phase().await;
    let degraded = state.is_degraded().await;
    let session = state
        .session()
        .read()
        .await
        .as_ref()
        .map(|session| session.snapshot());
    SessionSnapshotResponse::new(phase, degraded, session)
}

/// Current scoreboard as an SSE event, for a client that just connected.
pub async fn session_snapshot_event(state: &SharedState) -> Option<ServerEvent> {
    let snapshot = session_snapshot(state).await;
    ServerEvent::json(Some(EVENT_SESSION_SNAPSHOT.to_string()), &snapshot)
        .inspect_err(|err| warn!(error = %err, "failed to serialize scoreboard snapshot"))
        .ok()
}

/// Broadcast the current scoreboard to every SSE subscriber.
pub async fn broadcast_session_snapshot(state: &SharedState) {
    let snapshot = session_snapshot(state).await;
    send_scoreboard_event(state, EVENT_SESSION_SNAPSHOT, &snapshot);
}

/// Broadcast a degraded mode change.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_scoreboard_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Forward degraded mode changes to the scoreboard stream until the state is dropped.
pub async fn forward_degraded_changes(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        broadcast_system_status(&state, degraded);
    }
}

fn send_scoreboard_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.scoreboard().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize scoreboard SSE payload"),
    }
}
