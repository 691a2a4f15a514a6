//! HTTP service for the todo list.
//!
//! # Overview
//! - `handlers`: the four `/api/todos` operations over an injected store.
//! - `store`: the `TodoStore` seam with in-memory and MongoDB backends.
//! - `config`: environment-driven startup settings.
//! - `error`: the single handler error type and its JSON mapping.
//!
//! `app` is the bare API router used by tests; `build_router` adds CORS,
//! request tracing and, in production, static asset serving.

pub mod config;
pub mod error;
pub mod handlers;
pub mod store;

use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, patch};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use config::{Config, StoreConfig};
pub use error::{AppError, AppResult};
pub use handlers::AppState;
pub use store::{MemoryStore, StoreError, TodoStore};

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/todos", get(handlers::list_todos).post(handlers::create_todo))
        .route(
            "/api/todos/{id}",
            patch(handlers::update_todo).delete(handlers::delete_todo),
        )
        .with_state(state)
}

/// CORS policy admitting exactly one origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]))
}

pub fn build_router(state: AppState, config: &Config) -> Result<Router, InvalidHeaderValue> {
    let mut router = app(state);
    if config.production {
        router = router.fallback_service(ServeDir::new(&config.static_dir));
    }
    Ok(router
        .layer(cors_layer(&config.cors_origin)?)
        .layer(TraceLayer::new_for_http()))
}

pub async fn run(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
