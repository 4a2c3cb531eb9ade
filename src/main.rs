use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod crypto;
mod db;
mod error;
mod models;
mod utils;

use config::Config;
use constants::API_VERSION;
use db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guides_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting guides backend");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Initialize database
    let db = Database::new(&config).await?;

    tracing::info!("Running database migrations...");
    db.run_migrations().await?;

    let app_state = api::AppState {
        db,
        config: config.clone(),
    };

    let app = build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Home
        .route("/api/v1", get(api::home::index))
        .route("/api/v1/", get(api::home::index))
        .route("/api/v1/help", get(api::home::help))
        // Authentication
        .route("/api/v1/auth/register", post(api::auth::register))
        .route("/api/v1/auth/login", post(api::auth::login))
        .route("/api/v1/auth/logout", post(api::auth::logout))
        .route("/api/v1/auth/refresh", post(api::auth::refresh_token))
        .route(
            "/api/v1/auth/password-reset/request",
            post(api::auth::request_password_reset),
        )
        .route(
            "/api/v1/auth/password-reset/confirm",
            post(api::auth::confirm_password_reset),
        )
        // Profile
        .route(
            "/api/v1/profile",
            get(api::profile::get_profile)
                .post(api::profile::edit_user)
                .put(api::profile::edit_user),
        )
        // Games
        .route(
            "/api/v1/games",
            get(api::games::list_games).post(api::games::add_game),
        )
        .route(
            "/api/v1/games/{id}",
            get(api::games::get_game)
                .put(api::games::rename_game)
                .delete(api::games::delete_game),
        )
        // Guides
        .route(
            "/api/v1/guides",
            get(api::guides::list_guides).post(api::guides::add_guide),
        )
        .route(
            "/api/v1/guides/featured",
            get(api::guides::list_featured_guides),
        )
        .route("/api/v1/guides/other", get(api::guides::list_other_guides))
        .route(
            "/api/v1/guides/{id}",
            get(api::guides::view_guide)
                .put(api::guides::edit_guide)
                .delete(api::guides::delete_guide),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
