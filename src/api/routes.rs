use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::{admin_key_middleware, AuthService};

use super::handlers::{admin_page, health_check, index, list_logs, track, AppState};

/// Build the application router. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so `/track` can see
/// the peer address.
pub fn create_router(state: Arc<AppState>, auth_service: Arc<AuthService>) -> Router {
    let protected_routes = Router::new()
        .route("/logs", get(list_logs))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            admin_key_middleware,
        ))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/", get(index))
        .route("/admin", get(admin_page))
        .route("/health", get(health_check))
        .route("/track", get(track))
        .with_state(state)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
}
