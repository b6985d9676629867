use crate::models::{AppState, Collection, SearchRequest, SearchResponse};
use crate::types::{AppError, AppResult};
use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search/{collection}", post(post_search))
        .with_state(state)
}

async fn post_search(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(request): Json<SearchRequest>,
) -> AppResult<ResponseJson<SearchResponse>> {
    let collection = parse_collection(&collection)?;

    info!(collection = %collection, semantic = request.semantic, "search request received");

    let results = state.search.search(collection, &request).await?;
    let count = results.len();

    Ok(Json(SearchResponse { results, count }))
}

pub(crate) fn parse_collection(segment: &str) -> Result<Collection, AppError> {
    Collection::from_path(segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown collection: {}", segment)))
}
