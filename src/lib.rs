// Tunza - directory and semantic search service for families seeking
// health specialists, schools, and outdoor clubs

pub mod config;
pub mod db;
pub mod embeddings;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
