use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, services::user_service, state::SharedState};

/// Header injected by the authentication proxy in front of the service.
pub const IDENTITY_HEADER: &str = "x-user-email";

/// Normalized email of the authenticated caller, registered or not.
#[derive(Debug, Clone)]
pub struct CallerEmail(pub String);

/// Reject requests without an identity and expose it to handlers.
pub async fn require_identity(mut req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let email = identity_from(req.headers())?;
    req.extensions_mut().insert(CallerEmail(email));
    Ok(next.run(req).await)
}

/// Reject requests from callers without a registered user and expose that user to handlers.
pub async fn require_user(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let email = identity_from(req.headers())?;
    let user = user_service::resolve_caller(&state, &email).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn identity_from(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(user_service::normalize_email)
        .ok_or_else(|| AppError::Unauthorized("missing identity header `X-User-Email`".into()))
}
