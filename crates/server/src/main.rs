use std::{net::SocketAddr, sync::Arc};

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use booking::Reconciler;
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod request_log;

use app_state::AppState;
use config::{load_settings, normalize_database_url};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::with_max_connections(&database_url, settings.max_connections)
        .await
        .map_err(|error| {
            error!(
                %database_url,
                error = %format!("{error:#}"),
                "failed to open SQLite database; verify the path and permissions"
            );
            error
        })?;

    let state = AppState {
        reconciler: Reconciler::new(storage),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/healthz", get(api::healthz))
        .route("/api/lessons", get(api::list_lessons))
        .route("/api/lessons/update", put(api::update_lessons))
        .route("/api/orders", post(api::create_order))
        .route("/api/orders/:order_id", get(api::get_order))
        .fallback(api::route_not_found)
        .layer(middleware::from_fn(request_log::log_request))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
