use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dao::models::UserEntity,
    dto::session::{
        AddActivePlayerRequest, AdjustStatRequest, AdjustStatResponse, OpenSessionRequest,
        SessionSnapshotResponse,
    },
    error::AppError,
    services::session_service::{self, ClockCommand},
    state::SharedState,
};

/// Live scoreboard endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/session",
            get(get_session).post(open_session).delete(close_session),
        )
        .route("/session/clock/start", post(start_clock))
        .route("/session/clock/pause", post(pause_clock))
        .route("/session/clock/toggle", post(toggle_clock))
        .route("/session/clock/reset", post(reset_clock))
        .route("/session/active", post(add_active))
        .route("/session/active/{player_id}", delete(remove_active))
        .route("/session/active/{player_id}/stats", post(adjust_stat))
}

/// Current scoreboard.
#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses((status = 200, description = "Scoreboard snapshot", body = SessionSnapshotResponse))
)]
pub async fn get_session(State(state): State<SharedState>) -> Json<SessionSnapshotResponse> {
    Json(session_service::snapshot(&state).await)
}

/// Open the scoreboard on a stored game.
#[utoipa::path(
    post,
    path = "/session",
    tag = "session",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    request_body = OpenSessionRequest,
    responses(
        (status = 200, description = "Scoreboard opened", body = SessionSnapshotResponse),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "A game is already open")
    )
)]
pub async fn open_session(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    Ok(Json(
        session_service::open_session(&state, &caller, payload.game_id).await?,
    ))
}

/// Save every on-court line and close the scoreboard.
#[utoipa::path(
    delete,
    path = "/session",
    tag = "session",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Scoreboard closed", body = SessionSnapshotResponse),
        (status = 409, description = "No game open"),
        (status = 503, description = "Stats could not be saved")
    )
)]
pub async fn close_session(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    Ok(Json(session_service::close_session(&state, &caller).await?))
}

/// Start the game clock.
#[utoipa::path(
    post,
    path = "/session/clock/start",
    tag = "session",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Clock running", body = SessionSnapshotResponse),
        (status = 409, description = "No game open or no time left")
    )
)]
pub async fn start_clock(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    clock(&state, &caller, ClockCommand::Start).await
}

/// Pause the game clock.
#[utoipa::path(
    post,
    path = "/session/clock/pause",
    tag = "session",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Clock paused", body = SessionSnapshotResponse),
        (status = 409, description = "No game open")
    )
)]
pub async fn pause_clock(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    clock(&state, &caller, ClockCommand::Pause).await
}

/// Flip the game clock between running and paused.
#[utoipa::path(
    post,
    path = "/session/clock/toggle",
    tag = "session",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Clock toggled", body = SessionSnapshotResponse),
        (status = 409, description = "No game open or no time left")
    )
)]
pub async fn toggle_clock(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    clock(&state, &caller, ClockCommand::Toggle).await
}

/// Stop the clock and restore the full duration. Counters are kept.
#[utoipa::path(
    post,
    path = "/session/clock/reset",
    tag = "session",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Clock reset", body = SessionSnapshotResponse),
        (status = 409, description = "No game open")
    )
)]
pub async fn reset_clock(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    Ok(Json(session_service::reset_clock(&state, &caller).await?))
}

/// Put a rostered player on court.
#[utoipa::path(
    post,
    path = "/session/active",
    tag = "session",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    request_body = AddActivePlayerRequest,
    responses(
        (status = 200, description = "Player on court", body = SessionSnapshotResponse),
        (status = 404, description = "Unknown player"),
        (status = 409, description = "Roster full, player already on court or no live game")
    )
)]
pub async fn add_active(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Json(payload): Json<AddActivePlayerRequest>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    Ok(Json(
        session_service::add_active(&state, &caller, payload.player_id).await?,
    ))
}

/// Save a player's counters and take them off court.
#[utoipa::path(
    delete,
    path = "/session/active/{player_id}",
    tag = "session",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        ("player_id" = Uuid, Path, description = "Player identifier")
    ),
    responses(
        (status = 200, description = "Player off court", body = SessionSnapshotResponse),
        (status = 404, description = "Player not on court"),
        (status = 503, description = "Stats could not be saved; the player stays on court")
    )
)]
pub async fn remove_active(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Path(player_id): Path<Uuid>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    Ok(Json(
        session_service::remove_active(&state, &caller, player_id).await?,
    ))
}

/// Adjust one counter of an on-court player.
#[utoipa::path(
    post,
    path = "/session/active/{player_id}/stats",
    tag = "session",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        ("player_id" = Uuid, Path, description = "Player identifier")
    ),
    request_body = AdjustStatRequest,
    responses(
        (status = 200, description = "New counter value", body = AdjustStatResponse),
        (status = 404, description = "Player not on court"),
        (status = 409, description = "Stats are being saved or no live game")
    )
)]
pub async fn adjust_stat(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Path(player_id): Path<Uuid>,
    Json(payload): Json<AdjustStatRequest>,
) -> Result<Json<AdjustStatResponse>, AppError> {
    Ok(Json(
        session_service::adjust_stat(&state, &caller, player_id, payload).await?,
    ))
}

async fn clock(
    state: &SharedState,
    caller: &UserEntity,
    command: ClockCommand,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    Ok(Json(
        session_service::control_clock(state, caller, command).await?,
    ))
}
