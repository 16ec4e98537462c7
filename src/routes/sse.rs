use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    services::{sse_events, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/scoreboard",
    tag = "sse",
    responses((status = 200, description = "Scoreboard snapshots", content_type = "text/event-stream", body = String))
)]
/// Stream scoreboard snapshots, starting with a handshake and the current snapshot.
pub async fn scoreboard_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = sse_service::subscribe_scoreboard(&state);
    info!("new scoreboard SSE connection");

    let mut initial = Vec::with_capacity(2);
    initial.extend(sse_service::handshake_event(&state).await);
    initial.extend(sse_events::session_snapshot_event(&state).await);
    sse_service::to_sse_stream(receiver, initial)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/scoreboard", get(scoreboard_stream))
}
