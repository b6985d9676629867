// Similarity matching against the database-side match function
//
// The comparison itself (cosine similarity over pgvector) lives in the
// `match_documents` Postgres function; this module owns the one canonical
// vector wire encoding and the call contract.

use crate::config::CollectionSearchConfig;
use crate::models::{Collection, MatchResult};
use crate::types::{SearchError, SearchResult};
use sqlx::PgPool;
use tracing::debug;

/// Render a query vector as a pgvector text literal, e.g. `[0.1,0.2,0.3]`.
///
/// The single wire representation used everywhere a vector crosses into
/// SQL. Length is validated against the embedding model's dimension before
/// any remote call.
pub fn encode_vector(vector: &[f32], dimension: usize) -> SearchResult<String> {
    if vector.len() != dimension {
        return Err(SearchError::Match(format!(
            "query vector has {} dimensions, expected {}",
            vector.len(),
            dimension
        )));
    }

    let mut literal = String::with_capacity(vector.len() * 10 + 2);
    literal.push('[');
    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        literal.push_str(&value.to_string());
    }
    literal.push(']');
    Ok(literal)
}

/// Invoke the server-side ranking function for a collection.
///
/// Returns (id, similarity) pairs ordered by descending similarity and
/// truncated to the configured count; empty when nothing clears the
/// threshold.
pub async fn match_documents(
    pool: &PgPool,
    collection: Collection,
    query_vector: &[f32],
    dimension: usize,
    config: CollectionSearchConfig,
) -> SearchResult<Vec<MatchResult>> {
    let literal = encode_vector(query_vector, dimension)?;

    let matches = sqlx::query_as::<_, MatchResult>(
        "SELECT id, similarity FROM match_documents($1::vector, $2::real, $3::int, $4::text)",
    )
    .bind(&literal)
    .bind(config.threshold)
    .bind(config.limit as i32)
    .bind(collection.table_name())
    .fetch_all(pool)
    .await
    .map_err(|e| SearchError::Match(format!("match_documents({}) failed: {}", collection, e)))?;

    debug!(
        collection = %collection,
        threshold = config.threshold,
        count = matches.len(),
        "similarity match completed"
    );

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_vector_literal() {
        let literal = encode_vector(&[0.5, -0.25, 1.0], 3).unwrap();
        assert_eq!(literal, "[0.5,-0.25,1]");
    }

    #[test]
    fn test_encode_vector_rejects_wrong_dimension() {
        let err = encode_vector(&[0.5, -0.25], 3).unwrap_err();
        assert_eq!(err.kind(), "match_error");
        assert!(err.to_string().contains("2 dimensions, expected 3"));
    }

    #[test]
    fn test_encode_vector_empty_is_rejected() {
        assert!(encode_vector(&[], 1536).is_err());
    }
}
