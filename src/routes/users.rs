use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::UserEntity,
    dto::{
        site_data::{SiteDataResponse, UpdateSiteDataRequest},
        user::{RegisterUserRequest, RegistrationResponse, TeamSummary, UserSummary},
    },
    error::AppError,
    routes::identity::{CallerEmail, require_identity},
    services::user_service,
    state::SharedState,
};

/// Registration only needs an identity; the user does not exist yet.
pub fn registration_router() -> Router<SharedState> {
    Router::new()
        .route("/users", post(register))
        .route_layer(middleware::from_fn(require_identity))
}

/// Account endpoints of registered users.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/teams", get(list_teams))
        .route("/site-data", get(get_site_data).put(update_site_data))
}

/// Register the caller and create their team.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User and team created", body = RegistrationResponse),
        (status = 400, description = "Missing team name"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Extension(CallerEmail(email)): Extension<CallerEmail>,
    Valid(Json(payload)): Valid<Json<RegisterUserRequest>>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let response = user_service::register(&state, email, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the users of the caller's team.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses((status = 200, description = "Users", body = [UserSummary]))
)]
pub async fn list_users(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    Ok(Json(user_service::list_users(&state, &caller).await?))
}

/// List the teams owned by the caller.
#[utoipa::path(
    get,
    path = "/teams",
    tag = "users",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses((status = 200, description = "Teams", body = [TeamSummary]))
)]
pub async fn list_teams(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<Vec<TeamSummary>>, AppError> {
    Ok(Json(user_service::list_teams(&state, &caller).await?))
}

/// Read the caller's current selection.
#[utoipa::path(
    get,
    path = "/site-data",
    tag = "users",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses((status = 200, description = "Current selection", body = SiteDataResponse))
)]
pub async fn get_site_data(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<SiteDataResponse>, AppError> {
    Ok(Json(user_service::get_site_data(&state, &caller).await?))
}

/// Replace the caller's current selection.
#[utoipa::path(
    put,
    path = "/site-data",
    tag = "users",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    request_body = UpdateSiteDataRequest,
    responses(
        (status = 200, description = "Selection saved", body = SiteDataResponse),
        (status = 404, description = "Selected game or player not found")
    )
)]
pub async fn update_site_data(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Json(payload): Json<UpdateSiteDataRequest>,
) -> Result<Json<SiteDataResponse>, AppError> {
    Ok(Json(
        user_service::update_site_data(&state, &caller, payload).await?,
    ))
}
