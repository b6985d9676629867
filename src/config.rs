use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    /// Expected output dimension of the embedding model; vectors of any
    /// other length are rejected before reaching the database.
    pub dimension: usize,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

/// Search tuning, hoisted out of individual call sites.
///
/// One `{threshold, limit}` pair per collection; every search path reads
/// these instead of hardcoding its own values.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub health_specialists: CollectionSearchConfig,
    pub schools: CollectionSearchConfig,
    pub outdoor_clubs: CollectionSearchConfig,
    /// Upper bound on each remote call (embedding, match, bulk fetch)
    pub remote_call_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CollectionSearchConfig {
    pub threshold: f32,
    pub limit: i64,
}

impl SearchConfig {
    pub fn remote_call_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_call_timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
            },
            embedding: EmbeddingConfig {
                api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                api_base: env::var("OPENAI_API_BASE")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-ada-002".to_string()),
                dimension: env::var("EMBEDDING_DIMENSION")
                    .unwrap_or_else(|_| "1536".to_string())
                    .parse()?,
                cache_capacity: env::var("EMBEDDING_CACHE_CAPACITY")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()?,
                cache_ttl_secs: env::var("EMBEDDING_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
            },
            search: SearchConfig {
                health_specialists: collection_config_from_env("HEALTH_SPECIALISTS")?,
                schools: collection_config_from_env("SCHOOLS")?,
                outdoor_clubs: collection_config_from_env("OUTDOOR_CLUBS")?,
                remote_call_timeout_secs: env::var("REMOTE_CALL_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            },
        })
    }
}

fn collection_config_from_env(prefix: &str) -> Result<CollectionSearchConfig> {
    Ok(CollectionSearchConfig {
        threshold: env::var(format!("{}_MATCH_THRESHOLD", prefix))
            .unwrap_or_else(|_| "0.3".to_string())
            .parse()?,
        limit: env::var(format!("{}_MATCH_COUNT", prefix))
            .unwrap_or_else(|_| "10".to_string())
            .parse()?,
    })
}
