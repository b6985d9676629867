//! The search pipeline
//!
//! `orchestrator` composes embed → match → hydrate into one semantic
//! search operation (plus the non-AI filtered fallback); `query` builds
//! query text from structured form fields and renders match explanations.

pub mod orchestrator;
pub mod query;

pub use orchestrator::{PostgresBackend, SearchBackend, SearchService};
pub use query::{build_search_query, match_percentage, match_reasoning};
