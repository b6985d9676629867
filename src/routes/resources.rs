// Resource creation and updates. The embedding is computed synchronously
// from the record's text fields at write time; updates always recompute
// it so stored vectors never go stale against edited attributes.

use crate::db::DatabaseOperations;
use crate::models::{
    AppState, Collection, NewHealthSpecialist, NewOutdoorClub, NewSchool, Resource,
};
use crate::routes::search::parse_collection;
use crate::types::{AppError, AppResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/resources/{collection}", post(create_resource))
        .route("/api/resources/{collection}/{id}", put(update_resource))
        .with_state(state)
}

async fn create_resource(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<(StatusCode, Json<Resource>)> {
    let collection = parse_collection(&collection)?;

    let resource = match collection {
        Collection::HealthSpecialists => {
            let data: NewHealthSpecialist = parse_payload(payload)?;
            let embedding = state.search.embedding_literal(&data.embedding_text()).await?;
            let row =
                DatabaseOperations::insert_health_specialist(&state.pool, &data, &embedding)
                    .await?;
            Resource::HealthSpecialist(row)
        }
        Collection::Schools => {
            let data: NewSchool = parse_payload(payload)?;
            let embedding = state.search.embedding_literal(&data.embedding_text()).await?;
            let row = DatabaseOperations::insert_school(&state.pool, &data, &embedding).await?;
            Resource::School(row)
        }
        Collection::OutdoorClubs => {
            let data: NewOutdoorClub = parse_payload(payload)?;
            let embedding = state.search.embedding_literal(&data.embedding_text()).await?;
            let row =
                DatabaseOperations::insert_outdoor_club(&state.pool, &data, &embedding).await?;
            Resource::OutdoorClub(row)
        }
    };

    info!(collection = %collection, id = %resource.id(), "resource created");

    Ok((StatusCode::CREATED, Json(resource)))
}

async fn update_resource(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, Uuid)>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<Resource>> {
    let collection = parse_collection(&collection)?;

    let resource = match collection {
        Collection::HealthSpecialists => {
            let data: NewHealthSpecialist = parse_payload(payload)?;
            let embedding = state.search.embedding_literal(&data.embedding_text()).await?;
            DatabaseOperations::update_health_specialist(&state.pool, id, &data, &embedding)
                .await?
                .map(Resource::HealthSpecialist)
        }
        Collection::Schools => {
            let data: NewSchool = parse_payload(payload)?;
            let embedding = state.search.embedding_literal(&data.embedding_text()).await?;
            DatabaseOperations::update_school(&state.pool, id, &data, &embedding)
                .await?
                .map(Resource::School)
        }
        Collection::OutdoorClubs => {
            let data: NewOutdoorClub = parse_payload(payload)?;
            let embedding = state.search.embedding_literal(&data.embedding_text()).await?;
            DatabaseOperations::update_outdoor_club(&state.pool, id, &data, &embedding)
                .await?
                .map(Resource::OutdoorClub)
        }
    };

    let resource = resource
        .ok_or_else(|| AppError::NotFound(format!("no resource {} in {}", id, collection)))?;

    info!(collection = %collection, id = %resource.id(), "resource updated, embedding recomputed");

    Ok(Json(resource))
}

fn parse_payload<T>(value: serde_json::Value) -> Result<T, AppError>
where
    T: serde::de::DeserializeOwned + Validate,
{
    let data: T = serde_json::from_value(value)
        .map_err(|e| AppError::InvalidRequest(format!("malformed payload: {}", e)))?;
    data.validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    Ok(data)
}
