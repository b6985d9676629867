//! API Routes
//!
//! - `/api/search/{collection}` - semantic and filtered search
//! - `/api/resources/{collection}` - resource creation and updates
//! - `/api/health` - health checks

pub mod health;
pub mod resources;
pub mod search;

use crate::middleware::apply_cors;
use crate::models::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let api_router = Router::new()
        .merge(search::router(state.clone()))
        .merge(resources::router(state.clone()))
        .merge(health::router(state));

    apply_cors(api_router.layer(TraceLayer::new_for_http()))
}
