//! Proctoring Cloud Server
//!
//! Persistence service for proctoring sessions. Agents submit one report per
//! (exam, candidate) and the final cheating log of every session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   PROCTOR CLOUD                      │
//! ├──────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌──────────────────┐  │
//! │  │  API      │  │  Auth     │  │  Recompute       │  │
//! │  │  (Axum)   │  │  (JWT)    │  │  (proctor-core)  │  │
//! │  └─────┬─────┘  └─────┬─────┘  └────────┬─────────┘  │
//! │        └──────────────┼─────────────────┘            │
//! │                       ▼                              │
//! │                ┌─────────────┐                       │
//! │                │ PostgreSQL  │                       │
//! │                └─────────────┘                       │
//! └──────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod models;
mod handlers;
mod middleware;
mod error;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "proctor_cloud=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("Proctor Cloud Server starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    let pool = db::create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    if !config.is_production() {
        let token = middleware::auth::issue_token(&config.jwt_secret, "dev-agent", config.jwt_expiration_hours)?;
        tracing::info!("Development token (CLOUD_API_TOKEN): {}", token);
    }

    let state = AppState {
        pool,
        config: config.clone(),
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check));

    // API routes (bearer token)
    let api_routes = Router::new()
        // Reports; the static `exam` segment wins over `:exam_id`
        .route("/api/v1/proctoring-reports", post(handlers::proctoring_reports::save))
        .route("/api/v1/proctoring-reports/exam/:exam_id", get(handlers::proctoring_reports::list_by_exam))
        .route("/api/v1/proctoring-reports/:exam_id/:candidate_email", get(handlers::proctoring_reports::get))

        // Cheating logs
        .route("/api/v1/cheating-logs", post(handlers::cheating_logs::save))
        .route("/api/v1/cheating-logs/:exam_id", get(handlers::cheating_logs::list_by_exam))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_api_auth
        ));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
