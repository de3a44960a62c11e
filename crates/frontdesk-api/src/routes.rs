//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, staff
//! authentication, rate limiting and the WebSocket upgrade route.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use frontdesk_core::error::FrontdeskError;

use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use crate::ws;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.api.cors_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Routes open to visitors and widgets.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/{id}/messages", get(handlers::session_messages));

    // Staff routes behind the credential verifier.
    let staff_routes = Router::new()
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/{id}/close", post(handlers::close_session))
        .route("/sessions/{id}/read", post(handlers::mark_read))
        .route(
            "/knowledge",
            get(handlers::list_knowledge).post(handlers::create_knowledge),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    let limiter = RateLimiter::new(state.config.api.rate_limit_per_sec);
    let http_routes = public_routes
        .merge(staff_routes)
        .layer(axum::middleware::from_fn(
            crate::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::Extension(limiter));

    // Long-lived socket exempt from rate limiting.
    let socket_routes = Router::new().route("/ws", get(ws::ws_handler));

    http_routes
        .merge(socket_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn allowed_origins(configured: &[String]) -> AllowOrigin {
    if configured.is_empty() {
        return AllowOrigin::any();
    }

    let origins: Vec<HeaderValue> = configured
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(origins)
}

/// Start the HTTP server on the configured host and port, stopping when
/// `shutdown` resolves.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), FrontdeskError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", state.config.general.host, state.config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FrontdeskError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| FrontdeskError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
