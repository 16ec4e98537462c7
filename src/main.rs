//! Courtside Back binary entrypoint wiring REST, SSE, storage and the external services.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "couch-store")]
use courtside_back::dao::league_store::couchdb::{CouchConfig, CouchLeagueStore};
#[cfg(feature = "mongo-store")]
use courtside_back::dao::league_store::mongodb::{MongoConfig, MongoLeagueStore};
use courtside_back::{
    config::AppConfig,
    dao::{
        league_store::{LeagueStore, memory::MemoryLeagueStore},
        storage::StorageError,
    },
    gateways::{
        brevo::{BrevoConfig, BrevoMailer},
        stripe::{StripeConfig, StripeGateway},
    },
    routes,
    services::{clock, sse_events, storage_supervisor},
    state::{AppState, SharedState},
};

/// Storage backend selected through `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreBackend {
    #[cfg(feature = "mongo-store")]
    Mongo,
    #[cfg(feature = "couch-store")]
    Couch,
    Memory,
}

impl StoreBackend {
    fn from_env() -> anyhow::Result<Self> {
        let raw = env::var("STORE_BACKEND").unwrap_or_default();
        match raw.trim().to_ascii_lowercase().as_str() {
            #[cfg(feature = "mongo-store")]
            "" | "mongo" | "mongodb" => Ok(Self::Mongo),
            #[cfg(not(feature = "mongo-store"))]
            "" => Ok(Self::Memory),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(Self::Couch),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unsupported STORE_BACKEND `{other}`"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let mailer = Arc::new(BrevoMailer::new(BrevoConfig::from_env()));
    let payments = Arc::new(StripeGateway::new(StripeConfig::from_env()));
    let app_state = AppState::new(config, mailer, payments);

    let backend = StoreBackend::from_env().context("selecting storage backend")?;
    info!(?backend, "storage backend selected");
    start_storage(app_state.clone(), backend).await;

    tokio::spawn(clock::run(app_state.clone()));
    tokio::spawn(sse_events::forward_degraded_changes(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the in-memory store right away, or supervise a remote backend in the background.
async fn start_storage(state: SharedState, backend: StoreBackend) {
    match backend {
        #[cfg(feature = "mongo-store")]
        StoreBackend::Mongo => {
            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store: Arc<dyn LeagueStore> =
                    Arc::new(MongoLeagueStore::connect(config).await?);
                Ok::<_, StorageError>(store)
            }));
        }
        #[cfg(feature = "couch-store")]
        StoreBackend::Couch => {
            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store: Arc<dyn LeagueStore> =
                    Arc::new(CouchLeagueStore::connect(config).await?);
                Ok::<_, StorageError>(store)
            }));
        }
        StoreBackend::Memory => {
            warn!("using the in-memory store; data is lost on restart");
            state.install_store(Arc::new(MemoryLeagueStore::new())).await;
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
