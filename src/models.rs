use crate::config::{CollectionSearchConfig, Config};
use crate::search::SearchService;
use sqlx::PgPool;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub search: Arc<SearchService>,
}

/// The three resource collections served by the directory.
///
/// Each maps to one Postgres table and carries the name of its
/// category-specific tag column (used by the filtered fallback search).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    HealthSpecialists,
    Schools,
    OutdoorClubs,
}

impl Collection {
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::HealthSpecialists => "health_specialists",
            Collection::Schools => "schools",
            Collection::OutdoorClubs => "outdoor_clubs",
        }
    }

    /// Column holding the category's string-list tags
    pub fn tag_column(&self) -> &'static str {
        match self {
            Collection::HealthSpecialists => "services",
            Collection::Schools => "programs",
            Collection::OutdoorClubs => "activities",
        }
    }

    pub fn search_config(&self, config: &crate::config::SearchConfig) -> CollectionSearchConfig {
        match self {
            Collection::HealthSpecialists => config.health_specialists,
            Collection::Schools => config.schools,
            Collection::OutdoorClubs => config.outdoor_clubs,
        }
    }

    /// Parse a URL path segment (kebab-case) into a collection
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "health-specialists" => Some(Collection::HealthSpecialists),
            "schools" => Some(Collection::Schools),
            "outdoor-clubs" => Some(Collection::OutdoorClubs),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

// Row models. FromRow is needed for runtime query_as (no DATABASE_URL at
// compile time). Column sets are the canonical per-category schema; the
// embedding column itself is never selected into these structs.

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct HealthSpecialistRow {
    pub id: uuid::Uuid,
    pub name: String,
    pub specialty: Option<String>,
    pub location: String,
    pub services: Vec<String>,
    pub bio: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct SchoolRow {
    pub id: uuid::Uuid,
    pub name: String,
    pub school_type: Option<String>,
    pub location: String,
    pub programs: Vec<String>,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct OutdoorClubRow {
    pub id: uuid::Uuid,
    pub name: String,
    pub location: String,
    pub activities: Vec<String>,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A directory resource, tagged by category
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Resource {
    HealthSpecialist(HealthSpecialistRow),
    School(SchoolRow),
    OutdoorClub(OutdoorClubRow),
}

impl Resource {
    pub fn id(&self) -> uuid::Uuid {
        match self {
            Resource::HealthSpecialist(r) => r.id,
            Resource::School(r) => r.id,
            Resource::OutdoorClub(r) => r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::HealthSpecialist(r) => &r.name,
            Resource::School(r) => &r.name,
            Resource::OutdoorClub(r) => &r.name,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Resource::HealthSpecialist(r) => &r.location,
            Resource::School(r) => &r.location,
            Resource::OutdoorClub(r) => &r.location,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Resource::HealthSpecialist(_) => Collection::HealthSpecialists,
            Resource::School(_) => Collection::Schools,
            Resource::OutdoorClub(_) => Collection::OutdoorClubs,
        }
    }
}

/// A single (id, similarity) pair from the match function, ordered by
/// descending similarity
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct MatchResult {
    pub id: uuid::Uuid,
    pub similarity: f32,
}

// API request/response types

/// Structured form fields from the guided search flows. All optional;
/// whatever is present gets concatenated into the query text.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct QueryForm {
    pub child_age: Option<String>,
    #[serde(default)]
    pub disability_types: Vec<String>,
    #[serde(default)]
    pub therapy_types: Vec<String>,
    pub school_type: Option<String>,
    #[serde(default)]
    pub activity_types: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub support_needs: Vec<String>,
    #[serde(default)]
    pub language_preference: Vec<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SearchRequest {
    /// Free-text query; takes precedence over `form` when both are set
    pub query: Option<String>,
    /// Structured form fields, concatenated into query text server-side
    pub form: Option<QueryForm>,
    /// When false, use the non-AI filtered path (no embedding call)
    #[serde(default = "default_semantic")]
    pub semantic: bool,
    /// Caller identity for optional search-history logging
    pub user_id: Option<uuid::Uuid>,
}

fn default_semantic() -> bool {
    true
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            form: None,
            semantic: true,
            user_id: None,
        }
    }
}

/// Attribute predicates for the filtered fallback path
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Case-insensitive substring match on location
    pub location: Option<String>,
    /// Array-overlap match on the collection's tag column
    pub tags: Vec<String>,
    /// Schools only: substring match on school_type
    pub school_type: Option<String>,
}

/// One ranked search result
///
/// Both search paths return this shape; the filtered path carries no
/// similarity score rather than a fabricated one.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub count: usize,
}

// Resource creation/update payloads. The embedding is computed
// server-side from the text fields at write time.

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct NewHealthSpecialist {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub specialty: Option<String>,
    #[validate(length(min = 1, message = "location must not be empty"))]
    pub location: String,
    #[serde(default)]
    pub services: Vec<String>,
    pub bio: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct NewSchool {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub school_type: Option<String>,
    #[validate(length(min = 1, message = "location must not be empty"))]
    pub location: String,
    #[serde(default)]
    pub programs: Vec<String>,
    pub description: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct NewOutdoorClub {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "location must not be empty"))]
    pub location: String,
    #[serde(default)]
    pub activities: Vec<String>,
    pub description: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl NewHealthSpecialist {
    /// Concatenated text fields, the embedding input
    pub fn embedding_text(&self) -> String {
        join_text_fields(&[
            Some(self.name.as_str()),
            self.specialty.as_deref(),
            Some(self.location.as_str()),
        ], &self.services, self.bio.as_deref())
    }
}

impl NewSchool {
    pub fn embedding_text(&self) -> String {
        join_text_fields(&[
            Some(self.name.as_str()),
            self.school_type.as_deref(),
            Some(self.location.as_str()),
        ], &self.programs, self.description.as_deref())
    }
}

impl NewOutdoorClub {
    pub fn embedding_text(&self) -> String {
        join_text_fields(&[
            Some(self.name.as_str()),
            None,
            Some(self.location.as_str()),
        ], &self.activities, self.description.as_deref())
    }
}

fn join_text_fields(fields: &[Option<&str>], tags: &[String], prose: Option<&str>) -> String {
    let mut parts: Vec<&str> = fields.iter().flatten().copied().collect();
    parts.extend(tags.iter().map(String::as_str));
    if let Some(prose) = prose {
        parts.push(prose);
    }
    parts.join(" ")
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_from_path() {
        assert_eq!(
            Collection::from_path("health-specialists"),
            Some(Collection::HealthSpecialists)
        );
        assert_eq!(Collection::from_path("schools"), Some(Collection::Schools));
        assert_eq!(
            Collection::from_path("outdoor-clubs"),
            Some(Collection::OutdoorClubs)
        );
        assert_eq!(Collection::from_path("favorites"), None);
    }

    #[test]
    fn test_tag_columns() {
        assert_eq!(Collection::HealthSpecialists.tag_column(), "services");
        assert_eq!(Collection::Schools.tag_column(), "programs");
        assert_eq!(Collection::OutdoorClubs.tag_column(), "activities");
    }

    #[test]
    fn test_embedding_text_concatenation() {
        let specialist = NewHealthSpecialist {
            name: "Dr. Achieng".to_string(),
            specialty: Some("Pediatric Therapy".to_string()),
            location: "Nairobi".to_string(),
            services: vec!["Speech Therapy".to_string(), "Occupational Therapy".to_string()],
            bio: Some("15 years experience".to_string()),
            contact_email: None,
            contact_phone: None,
        };
        assert_eq!(
            specialist.embedding_text(),
            "Dr. Achieng Pediatric Therapy Nairobi Speech Therapy Occupational Therapy 15 years experience"
        );
    }

    #[test]
    fn test_embedding_text_skips_missing_fields() {
        let club = NewOutdoorClub {
            name: "Trailblazers".to_string(),
            location: "Nakuru".to_string(),
            activities: vec![],
            description: None,
            contact_email: None,
            contact_phone: None,
        };
        assert_eq!(club.embedding_text(), "Trailblazers Nakuru");
    }
}
