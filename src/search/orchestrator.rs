// Search orchestration: validate -> embed -> match -> hydrate
//
// Steps run strictly sequentially and fail fast; every remote call is
// bounded by the configured timeout. Zero matches is a valid empty
// result, not an error.

use crate::config::{CollectionSearchConfig, Config, SearchConfig};
use crate::db::DatabaseOperations;
use crate::embeddings::{self, CachingEmbedder, Embedder, OpenAiEmbedder};
use crate::models::{
    Collection, MatchResult, Resource, SearchFilters, SearchHit, SearchRequest,
};
use crate::search::query::{build_search_query, match_percentage, match_reasoning};
use crate::types::{SearchError, SearchResult};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Backing-store operations the orchestrator depends on.
///
/// The Postgres implementation delegates to the server-side match
/// function and bulk queries; tests substitute in-memory fakes.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Ranked (id, similarity) pairs for a query vector, descending
    async fn match_resources(
        &self,
        collection: Collection,
        query_vector: &[f32],
        config: CollectionSearchConfig,
    ) -> SearchResult<Vec<MatchResult>>;

    /// Full records for a set of IDs, in store order; missing IDs absent
    async fn fetch_by_ids(
        &self,
        collection: Collection,
        ids: &[Uuid],
    ) -> SearchResult<Vec<Resource>>;

    /// Attribute-predicate query for the non-AI fallback
    async fn filter(
        &self,
        collection: Collection,
        filters: &SearchFilters,
        limit: i64,
    ) -> SearchResult<Vec<Resource>>;

    /// Record a query in the per-user search history
    async fn log_search(&self, user_id: Uuid, query: &str) -> SearchResult<()>;
}

pub struct PostgresBackend {
    pool: PgPool,
    dimension: usize,
}

impl PostgresBackend {
    pub fn new(pool: PgPool, dimension: usize) -> Self {
        Self { pool, dimension }
    }
}

#[async_trait]
impl SearchBackend for PostgresBackend {
    async fn match_resources(
        &self,
        collection: Collection,
        query_vector: &[f32],
        config: CollectionSearchConfig,
    ) -> SearchResult<Vec<MatchResult>> {
        embeddings::match_documents(&self.pool, collection, query_vector, self.dimension, config)
            .await
    }

    async fn fetch_by_ids(
        &self,
        collection: Collection,
        ids: &[Uuid],
    ) -> SearchResult<Vec<Resource>> {
        DatabaseOperations::fetch_by_ids(&self.pool, collection, ids)
            .await
            .map_err(|e| SearchError::Fetch(format!("bulk fetch from {} failed: {}", collection, e)))
    }

    async fn filter(
        &self,
        collection: Collection,
        filters: &SearchFilters,
        limit: i64,
    ) -> SearchResult<Vec<Resource>> {
        DatabaseOperations::filtered(&self.pool, collection, filters, limit)
            .await
            .map_err(|e| {
                SearchError::Fetch(format!("filtered query on {} failed: {}", collection, e))
            })
    }

    async fn log_search(&self, user_id: Uuid, query: &str) -> SearchResult<()> {
        DatabaseOperations::insert_search_history(&self.pool, user_id, query)
            .await
            .map_err(|e| SearchError::Fetch(format!("search history insert failed: {}", e)))
    }
}

pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn SearchBackend>,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn SearchBackend>,
        config: SearchConfig,
    ) -> Self {
        Self {
            embedder,
            backend,
            config,
        }
    }

    /// Wire up the production service: OpenAI embedder behind the query
    /// cache, Postgres backend.
    pub fn from_config(config: &Config, pool: PgPool) -> Self {
        let embedder: Arc<dyn Embedder> = Arc::new(CachingEmbedder::new(
            Arc::new(OpenAiEmbedder::from_config(&config.embedding)),
            config.embedding.cache_capacity,
            Duration::from_secs(config.embedding.cache_ttl_secs),
        ));
        let backend = Arc::new(PostgresBackend::new(pool, config.embedding.dimension));

        Self::new(embedder, backend, config.search.clone())
    }

    /// Entry point for the HTTP surface: dispatches between the semantic
    /// and filtered paths based on the request.
    pub async fn search(
        &self,
        collection: Collection,
        request: &SearchRequest,
    ) -> SearchResult<Vec<SearchHit>> {
        if request.semantic {
            let query_text = match (&request.query, &request.form) {
                (Some(query), _) => query.clone(),
                (None, Some(form)) => build_search_query(form),
                (None, None) => String::new(),
            };
            self.semantic_search(collection, &query_text, request.user_id)
                .await
        } else {
            let filters = filters_from_request(collection, request);
            self.filtered_search(collection, &filters).await
        }
    }

    /// Semantic search: embed the query, rank against the collection's
    /// stored vectors, hydrate the ranked IDs into full records.
    pub async fn semantic_search(
        &self,
        collection: Collection,
        query: &str,
        user_id: Option<Uuid>,
    ) -> SearchResult<Vec<SearchHit>> {
        // Rejected here, before any remote call
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::Validation(
                "query must not be empty".to_string(),
            ));
        }

        // Best effort; the search never depends on history logging
        if let Some(user_id) = user_id {
            if let Err(e) = self.backend.log_search(user_id, query).await {
                warn!(error = %e, "failed to log search history");
            }
        }

        let timeout = self.config.remote_call_timeout();
        let collection_config = collection.search_config(&self.config);

        let query_vector = bounded(timeout, self.embedder.embed(query), || {
            SearchError::EmbeddingService("embedding call timed out".to_string())
        })
        .await?;

        let matches = bounded(
            timeout,
            self.backend
                .match_resources(collection, &query_vector, collection_config),
            || SearchError::Match("match call timed out".to_string()),
        )
        .await?;

        info!(
            collection = %collection,
            matches = matches.len(),
            "semantic search matched"
        );

        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = matches.iter().map(|m| m.id).collect();
        let resources = bounded(timeout, self.backend.fetch_by_ids(collection, &ids), || {
            SearchError::Fetch("bulk fetch timed out".to_string())
        })
        .await?;

        let hits = hydrate_ranked(&matches, resources)
            .into_iter()
            .map(|(resource, similarity)| {
                let reasoning = match_reasoning(&resource, query, similarity);
                SearchHit {
                    resource,
                    similarity: Some(similarity),
                    match_percentage: Some(match_percentage(similarity)),
                    reasoning: Some(reasoning),
                }
            })
            .collect();

        Ok(hits)
    }

    /// Non-AI fallback: attribute predicates only, no embedding call,
    /// store-default order, capped at the collection's configured limit.
    pub async fn filtered_search(
        &self,
        collection: Collection,
        filters: &SearchFilters,
    ) -> SearchResult<Vec<SearchHit>> {
        let limit = collection.search_config(&self.config).limit;
        let resources = self.backend.filter(collection, filters, limit).await?;

        Ok(resources
            .into_iter()
            .map(|resource| SearchHit {
                resource,
                similarity: None,
                match_percentage: None,
                reasoning: None,
            })
            .collect())
    }

    /// Embed record text for a write path and return the canonical
    /// vector literal to store alongside the row.
    pub async fn embedding_literal(&self, text: &str) -> SearchResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SearchError::Validation(
                "no text fields to embed".to_string(),
            ));
        }

        let vector = bounded(
            self.config.remote_call_timeout(),
            self.embedder.embed(text),
            || SearchError::EmbeddingService("embedding call timed out".to_string()),
        )
        .await?;

        embeddings::encode_vector(&vector, self.embedder.dimension())
    }
}

/// Derive fallback predicates from the structured form: the collection's
/// tag list plus location (and school type for schools).
fn filters_from_request(collection: Collection, request: &SearchRequest) -> SearchFilters {
    let Some(form) = &request.form else {
        return SearchFilters::default();
    };

    let tags = match collection {
        Collection::HealthSpecialists => form.therapy_types.clone(),
        Collection::Schools => form.support_needs.clone(),
        Collection::OutdoorClubs => form.activity_types.clone(),
    };

    SearchFilters {
        location: form.location.clone().filter(|l| !l.trim().is_empty()),
        tags,
        school_type: match collection {
            Collection::Schools => form.school_type.clone().filter(|t| !t.trim().is_empty()),
            _ => None,
        },
    }
}

/// Reorder unordered fetch results to the similarity ranking, pairing
/// each resource with its score. IDs that did not hydrate are dropped;
/// resources the matcher never returned are never included.
fn hydrate_ranked(matches: &[MatchResult], resources: Vec<Resource>) -> Vec<(Resource, f32)> {
    let mut by_id: HashMap<Uuid, Resource> =
        resources.into_iter().map(|r| (r.id(), r)).collect();

    matches
        .iter()
        .filter_map(|m| by_id.remove(&m.id).map(|r| (r, m.similarity)))
        .collect()
}

async fn bounded<T, F, E>(timeout: Duration, fut: F, on_timeout: E) -> SearchResult<T>
where
    F: Future<Output = SearchResult<T>>,
    E: FnOnce() -> SearchError,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HealthSpecialistRow, QueryForm};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn specialist(id: Uuid, name: &str, location: &str) -> Resource {
        Resource::HealthSpecialist(HealthSpecialistRow {
            id,
            name: name.to_string(),
            specialty: Some("Pediatric Therapy".to_string()),
            location: location.to_string(),
            services: vec!["Speech Therapy".to_string()],
            bio: Some("Experienced specialist".to_string()),
            contact_email: Some("clinic@example.com".to_string()),
            contact_phone: Some("+254700000000".to_string()),
            created_at: chrono::Utc::now(),
        })
    }

    fn test_config() -> SearchConfig {
        let per_collection = CollectionSearchConfig {
            threshold: 0.3,
            limit: 10,
        };
        SearchConfig {
            health_specialists: per_collection,
            schools: per_collection,
            outdoor_clubs: per_collection,
            remote_call_timeout_secs: 5,
        }
    }

    struct FakeEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeEmbedder {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, _text: &str) -> SearchResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SearchError::EmbeddingService("provider down".to_string()))
            } else {
                Ok(vec![0.1, 0.2, 0.3])
            }
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        matches: Vec<MatchResult>,
        resources: Vec<Resource>,
        match_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        filter_calls: AtomicUsize,
        history: Mutex<Vec<(Uuid, String)>>,
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn match_resources(
            &self,
            _collection: Collection,
            _query_vector: &[f32],
            _config: CollectionSearchConfig,
        ) -> SearchResult<Vec<MatchResult>> {
            self.match_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.matches.clone())
        }

        async fn fetch_by_ids(
            &self,
            _collection: Collection,
            ids: &[Uuid],
        ) -> SearchResult<Vec<Resource>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            // Store order, not ranked order
            let mut found: Vec<Resource> = self
                .resources
                .iter()
                .filter(|r| ids.contains(&r.id()))
                .cloned()
                .collect();
            found.reverse();
            Ok(found)
        }

        async fn filter(
            &self,
            _collection: Collection,
            _filters: &SearchFilters,
            limit: i64,
        ) -> SearchResult<Vec<Resource>> {
            self.filter_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .resources
                .iter()
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn log_search(&self, user_id: Uuid, query: &str) -> SearchResult<()> {
            self.history.lock().await.push((user_id, query.to_string()));
            Ok(())
        }
    }

    fn service(embedder: Arc<FakeEmbedder>, backend: Arc<FakeBackend>) -> SearchService {
        SearchService::new(embedder, backend, test_config())
    }

    #[tokio::test]
    async fn test_results_ordered_by_descending_similarity() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let backend = Arc::new(FakeBackend {
            matches: vec![
                MatchResult { id: first, similarity: 0.9 },
                MatchResult { id: second, similarity: 0.6 },
            ],
            resources: vec![
                specialist(first, "Dr. Achieng", "Nairobi"),
                specialist(second, "Dr. Otieno", "Kisumu"),
            ],
            ..Default::default()
        });
        let svc = service(Arc::new(FakeEmbedder::new(false)), backend);

        let hits = svc
            .semantic_search(Collection::HealthSpecialists, "pediatrician Nairobi therapy", None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].resource.id(), first);
        assert_eq!(hits[1].resource.id(), second);
        assert!(hits[0].similarity.unwrap() >= hits[1].similarity.unwrap());
        assert_eq!(hits[0].match_percentage, Some(90));
        assert!(hits[0].reasoning.as_ref().unwrap().contains("Nairobi"));
    }

    #[tokio::test]
    async fn test_no_spurious_records_from_hydration() {
        let matched = Uuid::new_v4();
        let unmatched = Uuid::new_v4();
        let backend = Arc::new(FakeBackend {
            matches: vec![MatchResult { id: matched, similarity: 0.8 }],
            resources: vec![
                specialist(matched, "Dr. Achieng", "Nairobi"),
                specialist(unmatched, "Dr. Stray", "Mombasa"),
            ],
            ..Default::default()
        });
        let svc = service(Arc::new(FakeEmbedder::new(false)), backend);

        let hits = svc
            .semantic_search(Collection::HealthSpecialists, "therapy", None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].resource.id(), matched);
    }

    #[tokio::test]
    async fn test_zero_matches_is_empty_not_error() {
        let backend = Arc::new(FakeBackend::default());
        let svc = service(Arc::new(FakeEmbedder::new(false)), backend.clone());

        let hits = svc
            .semantic_search(Collection::Schools, "montessori nakuru", None)
            .await
            .unwrap();

        assert!(hits.is_empty());
        // No hydration attempted for an empty match set
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_pipeline() {
        let backend = Arc::new(FakeBackend::default());
        let svc = service(Arc::new(FakeEmbedder::new(true)), backend.clone());

        let err = svc
            .semantic_search(Collection::HealthSpecialists, "therapy", None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "embedding_service_error");
        assert_eq!(backend.match_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_any_remote_call() {
        let embedder = Arc::new(FakeEmbedder::new(false));
        let backend = Arc::new(FakeBackend::default());
        let svc = service(embedder.clone(), backend.clone());

        let err = svc
            .semantic_search(Collection::OutdoorClubs, "   ", None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation_error");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.match_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_partial_hydration_drops_missing_row_silently() {
        let present = Uuid::new_v4();
        let deleted = Uuid::new_v4();
        let backend = Arc::new(FakeBackend {
            matches: vec![
                MatchResult { id: present, similarity: 0.7 },
                MatchResult { id: deleted, similarity: 0.5 },
            ],
            // Second row deleted concurrently; only one hydrates
            resources: vec![specialist(present, "Dr. Achieng", "Nairobi")],
            ..Default::default()
        });
        let svc = service(Arc::new(FakeEmbedder::new(false)), backend);

        let hits = svc
            .semantic_search(Collection::HealthSpecialists, "therapy", None)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].resource.id(), present);
    }

    #[tokio::test]
    async fn test_fallback_filtered_search_makes_no_embedding_call() {
        let embedder = Arc::new(FakeEmbedder::new(false));
        let backend = Arc::new(FakeBackend {
            resources: (0..15)
                .map(|i| specialist(Uuid::new_v4(), &format!("Dr. {}", i), "Nairobi"))
                .collect(),
            ..Default::default()
        });
        let svc = service(embedder.clone(), backend.clone());

        let request = SearchRequest {
            semantic: false,
            form: Some(QueryForm {
                location: Some("Nairobi".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let hits = svc
            .search(Collection::HealthSpecialists, &request)
            .await
            .unwrap();

        assert_eq!(hits.len(), 10); // capped at the configured limit
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.filter_calls.load(Ordering::SeqCst), 1);
        assert!(hits.iter().all(|h| h.similarity.is_none()));
    }

    #[tokio::test]
    async fn test_search_builds_query_from_form() {
        let id = Uuid::new_v4();
        let backend = Arc::new(FakeBackend {
            matches: vec![MatchResult { id, similarity: 0.8 }],
            resources: vec![specialist(id, "Dr. Achieng", "Nairobi")],
            ..Default::default()
        });
        let svc = service(Arc::new(FakeEmbedder::new(false)), backend);

        let request = SearchRequest {
            form: Some(QueryForm {
                therapy_types: vec!["Speech Therapy".to_string()],
                location: Some("Nairobi".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let hits = svc
            .search(Collection::HealthSpecialists, &request)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_search_with_empty_form_is_validation_error() {
        let svc = service(
            Arc::new(FakeEmbedder::new(false)),
            Arc::new(FakeBackend::default()),
        );

        let err = svc
            .search(Collection::Schools, &SearchRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation_error");
    }

    #[tokio::test]
    async fn test_history_logged_when_user_supplied() {
        let user_id = Uuid::new_v4();
        let backend = Arc::new(FakeBackend::default());
        let svc = service(Arc::new(FakeEmbedder::new(false)), backend.clone());

        svc.semantic_search(Collection::Schools, "inclusive school thika", Some(user_id))
            .await
            .unwrap();

        let history = backend.history.lock().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], (user_id, "inclusive school thika".to_string()));
    }

    #[test]
    fn test_hydrate_ranked_restores_similarity_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let matches = vec![
            MatchResult { id: a, similarity: 0.9 },
            MatchResult { id: b, similarity: 0.4 },
        ];
        // Fetch came back in the opposite order
        let resources = vec![
            specialist(b, "Dr. Second", "Kisumu"),
            specialist(a, "Dr. First", "Nairobi"),
        ];

        let ranked = hydrate_ranked(&matches, resources);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0.id(), a);
        assert_eq!(ranked[1].0.id(), b);
    }
}
