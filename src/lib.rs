pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health::health))
        .merge(public_routes())
        .merge(api_routes(state.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "fleet-api"
}

/// Routes reachable without a bearer token: session bootstrap, device-agent
/// enrollment and telemetry, and share-URL redemption.
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/register", post(handlers::auth::register))
        .route("/devices/register", post(handlers::devices::register))
        .route("/devices/:key/heartbeat", post(handlers::devices::heartbeat))
        .route("/connect/:token", get(handlers::devices::connect))
}

/// Everything under /api requires a valid bearer token.
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(handlers::auth::whoami))
        .route("/api/auth/logout", post(handlers::auth::logout))
        // Users
        .route("/api/users", post(handlers::users::create).get(handlers::users::list))
        .route(
            "/api/users/:id",
            get(handlers::users::get)
                .patch(handlers::users::update)
                .delete(handlers::users::delete),
        )
        .route("/api/users/:id/tenants", get(handlers::users::tenants))
        .route(
            "/api/users/:id/tenants/:tenant_id",
            put(handlers::users::assign_tenant).delete(handlers::users::remove_tenant),
        )
        .route(
            "/api/users/:id/tags",
            get(handlers::users::tags).put(handlers::users::assign_tags),
        )
        // Tenants
        .route("/api/tenants", post(handlers::tenants::create).get(handlers::tenants::list))
        .route(
            "/api/tenants/:id",
            get(handlers::tenants::get)
                .patch(handlers::tenants::update)
                .delete(handlers::tenants::delete),
        )
        .route(
            "/api/tenants/:id/settings",
            get(handlers::tenants::get_settings).put(handlers::tenants::update_settings),
        )
        .route(
            "/api/tenants/:id/tags",
            get(handlers::tenants::tags).put(handlers::tenants::assign_tags),
        )
        // Folders
        .route("/api/folders", post(handlers::folders::create).get(handlers::folders::list))
        .route(
            "/api/folders/:id",
            get(handlers::folders::get)
                .patch(handlers::folders::update)
                .delete(handlers::folders::delete),
        )
        .route(
            "/api/folders/:id/tags",
            get(handlers::folders::tags).put(handlers::folders::assign_tags),
        )
        // Devices
        .route("/api/devices", post(handlers::devices::create).get(handlers::devices::list))
        .route(
            "/api/devices/:key",
            get(handlers::devices::get)
                .patch(handlers::devices::update)
                .delete(handlers::devices::delete),
        )
        .route("/api/devices/:key/share", post(handlers::devices::share))
        .route(
            "/api/devices/:key/tags",
            get(handlers::devices::tags).put(handlers::devices::assign_tags),
        )
        // Tags
        .route("/api/tags", post(handlers::tags::create).get(handlers::tags::list))
        .route(
            "/api/tags/:id",
            get(handlers::tags::get)
                .patch(handlers::tags::update)
                .delete(handlers::tags::delete),
        )
        .route_layer(from_fn_with_state(state, middleware::auth::require_auth))
}
