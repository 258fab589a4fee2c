//! RPC server routes

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::{self, ApiState};

/// Create the router serving JSON-RPC on `/` and a health check
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handlers::handle_rpc))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(cors)
}
