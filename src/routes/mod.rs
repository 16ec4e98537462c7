use axum::{Router, middleware};

use crate::state::SharedState;

pub mod billing;
pub mod docs;
pub mod email;
pub mod games;
pub mod health;
pub mod identity;
pub mod roster;
pub mod session;
pub mod sse;
pub mod users;

/// Compose all route trees, wiring in shared state, identity checks and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let registered = users::router()
        .merge(roster::router())
        .merge(games::router())
        .merge(session::router())
        .merge(email::router())
        .merge(billing::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity::require_user,
        ));

    let public = health::router()
        .merge(sse::router())
        .merge(billing::webhook_router())
        .merge(docs::router());

    public
        .merge(users::registration_router())
        .merge(registered)
        .with_state(state)
}
