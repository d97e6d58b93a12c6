//! Quiz Duel backend entrypoint wiring REST, the challenge WebSocket, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use services::results::HttpResultSink;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let result_sink = Arc::new(HttpResultSink::new(config.result_api_url().to_owned()));
    let app_state = AppState::new(config, result_sink);

    spawn_storage_supervisor(app_state.clone());

    // Build the HTTP router once the shared state is ready.
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

/// Spawn the background task that owns the challenge store connection.
#[cfg(feature = "mongo-store")]
fn spawn_storage_supervisor(state: SharedState) {
    use dao::challenge_store::mongodb::{MongoChallengeStore, MongoConfig};
    use dao::challenge_store::ChallengeStore;
    use dao::storage::StorageError;

    tokio::spawn(services::storage_supervisor::run(state, move || async {
        let config = MongoConfig::from_env_or_default()
            .await
            .map_err(|err| StorageError::unavailable("invalid MongoDB configuration".into(), err))?;
        let store = MongoChallengeStore::connect(config)
            .await
            .map_err(|err| StorageError::unavailable("MongoDB connection failed".into(), err))?;
        Ok(Arc::new(store) as Arc<dyn ChallengeStore>)
    }));
}

/// Without a database backend the server runs entirely in memory; challenges
/// are lost on restart but sessions behave identically.
#[cfg(not(feature = "mongo-store"))]
fn spawn_storage_supervisor(state: SharedState) {
    use dao::challenge_store::memory::InMemoryChallengeStore;

    tokio::spawn(async move {
        state
            .install_challenge_store(Arc::new(InMemoryChallengeStore::new()))
            .await;
        info!("using in-memory challenge store");
    });
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
