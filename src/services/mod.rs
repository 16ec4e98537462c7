/// Subscription checkout, status checks and payment webhooks.
pub mod billing_service;
/// Background driver ticking the game clock.
pub mod clock;
/// OpenAPI documentation generation.
pub mod documentation;
/// Parent emails and their log.
pub mod email_service;
/// Game creation, lookup and deletion.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Roster players and their cached listing.
pub mod roster_service;
/// Live scoreboard commands and lifecycle transitions.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Stat lines and box scores.
pub mod stats_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Registration, caller resolution and site data.
pub mod user_service;
