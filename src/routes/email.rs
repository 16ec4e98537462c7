use axum::{Extension, Json, Router, extract::State, routing::get};
use axum_valid::Valid;

use crate::{
    dao::models::UserEntity,
    dto::email::{EmailLogSummary, SendEmailRequest},
    error::AppError,
    services::email_service,
    state::SharedState,
};

/// Parent communication endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route("/emails", get(list_email_logs).post(send_email))
}

/// Emails sent on behalf of the caller's team.
#[utoipa::path(
    get,
    path = "/emails",
    tag = "communication",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Email log", body = [EmailLogSummary]),
        (status = 402, description = "No active subscription")
    )
)]
pub async fn list_email_logs(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<Vec<EmailLogSummary>>, AppError> {
    Ok(Json(email_service::list_email_logs(&state, &caller).await?))
}

/// Send an email to parents.
#[utoipa::path(
    post,
    path = "/emails",
    tag = "communication",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "Email sent", body = EmailLogSummary),
        (status = 400, description = "Invalid recipients or content"),
        (status = 402, description = "No active subscription"),
        (status = 502, description = "Email API failure")
    )
)]
pub async fn send_email(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Valid(Json(payload)): Valid<Json<SendEmailRequest>>,
) -> Result<Json<EmailLogSummary>, AppError> {
    Ok(Json(
        email_service::send_email(&state, &caller, payload).await?,
    ))
}
