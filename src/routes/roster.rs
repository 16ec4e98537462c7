use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dao::models::UserEntity,
    dto::{
        roster::{CreatePlayerRequest, PlayerStatsQuery, PlayerSummary},
        stats::StatLineSummary,
    },
    error::AppError,
    services::roster_service,
    state::SharedState,
};

/// Roster management endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", get(list_players).post(create_player))
        .route("/players/{id}", delete(delete_player))
        .route("/players/{id}/stats", get(player_stats))
}

/// List the caller's roster.
#[utoipa::path(
    get,
    path = "/players",
    tag = "roster",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses((status = 200, description = "Roster", body = [PlayerSummary]))
)]
pub async fn list_players(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<Vec<PlayerSummary>>, AppError> {
    Ok(Json(roster_service::list_players(&state, &caller).await?))
}

/// Add a player to the caller's roster.
#[utoipa::path(
    post,
    path = "/players",
    tag = "roster",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    request_body = CreatePlayerRequest,
    responses(
        (status = 201, description = "Player created", body = PlayerSummary),
        (status = 400, description = "Empty name")
    )
)]
pub async fn create_player(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Valid(Json(payload)): Valid<Json<CreatePlayerRequest>>,
) -> Result<(StatusCode, Json<PlayerSummary>), AppError> {
    let player = roster_service::create_player(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// Remove a player from the caller's roster.
#[utoipa::path(
    delete,
    path = "/players/{id}",
    tag = "roster",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        ("id" = Uuid, Path, description = "Player identifier")
    ),
    responses(
        (status = 204, description = "Player deleted"),
        (status = 404, description = "Unknown player"),
        (status = 409, description = "Player is on court")
    )
)]
pub async fn delete_player(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    roster_service::delete_player(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Latest stat line of a player for a game.
#[utoipa::path(
    get,
    path = "/players/{id}/stats",
    tag = "roster",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        ("id" = Uuid, Path, description = "Player identifier"),
        PlayerStatsQuery
    ),
    responses(
        (status = 200, description = "Stat line", body = StatLineSummary),
        (status = 404, description = "No stats recorded")
    )
)]
pub async fn player_stats(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Path(id): Path<Uuid>,
    Query(query): Query<PlayerStatsQuery>,
) -> Result<Json<StatLineSummary>, AppError> {
    Ok(Json(
        roster_service::player_stats(&state, &caller, id, query.game_id).await?,
    ))
}
