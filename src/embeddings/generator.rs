// OpenAI embeddings adapter
// API Reference: https://platform.openai.com/docs/api-reference/embeddings

use crate::config::EmbeddingConfig;
use crate::types::{SearchError, SearchResult};
use async_trait::async_trait;
use lru::LruCache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Converts a text string into a fixed-length embedding vector.
///
/// One outbound call per invocation; failures surface immediately as
/// `SearchError::EmbeddingService` with no retry.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> SearchResult<Vec<f32>>;

    /// Output dimension every returned vector is validated against
    fn dimension(&self) -> usize;
}

// Request/response types for the embeddings endpoint

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, api_base: &str, model: &str, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            &config.api_key,
            &config.api_base,
            &config.model,
            config.dimension,
        )
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> SearchResult<Vec<f32>> {
        let url = format!("{}/embeddings", self.api_base);

        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::EmbeddingService(format!("request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(SearchError::EmbeddingService(format!(
                    "API error ({}): {} (type: {:?})",
                    status, error_response.error.message, error_response.error.error_type
                )));
            }

            return Err(SearchError::EmbeddingService(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| SearchError::EmbeddingService(format!("failed to parse response: {}", e)))?;

        let embedding = embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                SearchError::EmbeddingService("provider returned no embedding data".to_string())
            })?;

        if embedding.len() != self.dimension {
            return Err(SearchError::EmbeddingService(format!(
                "expected {}-dimensional embedding, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Normalize query text for use as a cache key: trimmed, lowercased,
/// whitespace collapsed
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

/// TTL-bounded LRU cache over another embedder, keyed by normalized query
/// text. Identical queries within the TTL reuse one upstream call.
pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl CachingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }
}

#[async_trait]
impl Embedder for CachingEmbedder {
    async fn embed(&self, text: &str) -> SearchResult<Vec<f32>> {
        let key = normalize_query(text);

        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&key) {
                if entry.inserted_at.elapsed() < self.ttl {
                    debug!(query = %key, "embedding cache hit");
                    return Ok(entry.vector.clone());
                }
                cache.pop(&key);
            }
        }

        let vector = self.inner.embed(text).await?;

        let mut cache = self.cache.lock().await;
        cache.put(
            key,
            CacheEntry {
                vector: vector.clone(),
                inserted_at: Instant::now(),
            },
        );

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Pediatrician   Nairobi "), "pediatrician nairobi");
        assert_eq!(normalize_query("Speech\tTherapy"), "speech therapy");
        assert_eq!(normalize_query(""), "");
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> SearchResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn test_cache_reuses_embedding_for_identical_queries() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachingEmbedder::new(inner.clone(), 16, Duration::from_secs(60));

        cached.embed("therapy Nairobi").await.unwrap();
        // Same query modulo whitespace and case hits the cache
        cached.embed("  Therapy   NAIROBI ").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachingEmbedder::new(inner.clone(), 16, Duration::ZERO);

        cached.embed("therapy").await.unwrap();
        cached.embed("therapy").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_embed_success_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "data": [{ "embedding": [0.5, -0.25, 0.125] }]
        });
        let mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::new("test-key", &server.url(), "text-embedding-ada-002", 3);
        let vector = embedder.embed("pediatrician Nairobi").await.unwrap();

        assert_eq!(vector, vec![0.5, -0.25, 0.125]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dimension() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "data": [{ "embedding": [0.5, -0.25] }]
        });
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::new("test-key", &server.url(), "text-embedding-ada-002", 3);
        let err = embedder.embed("pediatrician").await.unwrap_err();

        assert_eq!(err.kind(), "embedding_service_error");
        assert!(err.to_string().contains("expected 3-dimensional"));
    }

    #[tokio::test]
    async fn test_embed_surfaces_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "error": { "message": "Rate limit exceeded", "type": "rate_limit_error" }
        });
        server
            .mock("POST", "/embeddings")
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::new("test-key", &server.url(), "text-embedding-ada-002", 3);
        let err = embedder.embed("pediatrician").await.unwrap_err();

        assert_eq!(err.kind(), "embedding_service_error");
        assert!(err.to_string().contains("Rate limit exceeded"));
    }
}
