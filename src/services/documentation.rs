use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Courtside Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::scoreboard_stream,
        crate::routes::users::register,
        crate::routes::users::list_users,
        crate::routes::users::list_teams,
        crate::routes::users::get_site_data,
        crate::routes::users::update_site_data,
        crate::routes::roster::list_players,
        crate::routes::roster::create_player,
        crate::routes::roster::delete_player,
        crate::routes::roster::player_stats,
        crate::routes::games::list_games,
        crate::routes::games::create_game,
        crate::routes::games::get_game,
        crate::routes::games::delete_game,
        crate::routes::games::game_stats,
        crate::routes::games::box_score,
        crate::routes::games::record_stat_line,
        crate::routes::session::get_session,
        crate::routes::session::open_session,
        crate::routes::session::close_session,
        crate::routes::session::start_clock,
        crate::routes::session::pause_clock,
        crate::routes::session::toggle_clock,
        crate::routes::session::reset_clock,
        crate::routes::session::add_active,
        crate::routes::session::remove_active,
        crate::routes::session::adjust_stat,
        crate::routes::email::list_email_logs,
        crate::routes::email::send_email,
        crate::routes::billing::create_checkout,
        crate::routes::billing::check_payment,
        crate::routes::billing::check_subscription,
        crate::routes::billing::cancel_subscription,
        crate::routes::billing::stripe_webhook,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::session::SessionSnapshotResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "users", description = "Registration, teams and site data"),
        (name = "roster", description = "Roster players"),
        (name = "games", description = "Games, stat lines and box scores"),
        (name = "session", description = "Live scoreboard"),
        (name = "communication", description = "Parent emails"),
        (name = "billing", description = "Subscription billing"),
    )
)]
pub struct ApiDoc;
