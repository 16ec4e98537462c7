use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dao::models::UserEntity,
    dto::{
        game::{CreateGameRequest, GameSummary},
        stats::{BoxScoreResponse, RecordStatLineRequest, StatLineSummary},
    },
    error::AppError,
    services::{game_service, stats_service},
    state::SharedState,
};

/// Game history and box score endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{id}", get(get_game).delete(delete_game))
        .route("/games/{id}/stats", get(game_stats))
        .route("/games/{id}/box-score", get(box_score))
        .route("/stats", post(record_stat_line))
}

/// List the caller's games.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses((status = 200, description = "Games", body = [GameSummary]))
)]
pub async fn list_games(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    Ok(Json(game_service::list_games(&state, &caller).await?))
}

/// Create a game against an opponent.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameSummary),
        (status = 400, description = "Invalid opponent or duration")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameSummary>), AppError> {
    let game = game_service::create_game(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// Retrieve a game by its ID.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    responses(
        (status = 200, description = "Game", body = GameSummary),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::get_game(&state, &caller, id).await?))
}

/// Delete a game together with its stat lines.
#[utoipa::path(
    delete,
    path = "/games/{id}",
    tag = "games",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    responses(
        (status = 204, description = "Game deleted"),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Game is open on the scoreboard")
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    game_service::delete_game(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// All stat lines of a game.
#[utoipa::path(
    get,
    path = "/games/{id}/stats",
    tag = "games",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    responses(
        (status = 200, description = "Stat lines", body = [StatLineSummary]),
        (status = 404, description = "Unknown game or no stats")
    )
)]
pub async fn game_stats(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatLineSummary>>, AppError> {
    Ok(Json(stats_service::game_stats(&state, &caller, id).await?))
}

/// Box score of a game with team totals.
#[utoipa::path(
    get,
    path = "/games/{id}/box-score",
    tag = "games",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        ("id" = Uuid, Path, description = "Game identifier")
    ),
    responses(
        (status = 200, description = "Box score", body = BoxScoreResponse),
        (status = 404, description = "Unknown game or no stats")
    )
)]
pub async fn box_score(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Path(id): Path<Uuid>,
) -> Result<Json<BoxScoreResponse>, AppError> {
    Ok(Json(stats_service::box_score(&state, &caller, id).await?))
}

/// Record a stat line, replacing the previous one of the same game and player.
#[utoipa::path(
    post,
    path = "/stats",
    tag = "games",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    request_body = RecordStatLineRequest,
    responses(
        (status = 200, description = "Stat line saved", body = StatLineSummary),
        (status = 404, description = "Unknown game or player")
    )
)]
pub async fn record_stat_line(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Valid(Json(payload)): Valid<Json<RecordStatLineRequest>>,
) -> Result<Json<StatLineSummary>, AppError> {
    Ok(Json(
        stats_service::record_stat_line(&state, &caller, payload).await?,
    ))
}
