use crate::models::{
    Collection, HealthSpecialistRow, NewHealthSpecialist, NewOutdoorClub, NewSchool,
    OutdoorClubRow, Resource, SchoolRow, SearchFilters,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

// Explicit column lists keep the embedding column out of row hydration
const SPECIALIST_COLUMNS: &str =
    "id, name, specialty, location, services, bio, contact_email, contact_phone, created_at";
const SCHOOL_COLUMNS: &str =
    "id, name, school_type, location, programs, description, contact_email, contact_phone, created_at";
const CLUB_COLUMNS: &str =
    "id, name, location, activities, description, contact_email, contact_phone, created_at";

fn columns_for(collection: Collection) -> &'static str {
    match collection {
        Collection::HealthSpecialists => SPECIALIST_COLUMNS,
        Collection::Schools => SCHOOL_COLUMNS,
        Collection::OutdoorClubs => CLUB_COLUMNS,
    }
}

pub struct DatabaseOperations;

impl DatabaseOperations {
    /// Bulk-fetch full records for a set of IDs.
    ///
    /// Results come back in store order, not input order; IDs with no
    /// matching row are simply absent. Callers that need the similarity
    /// ranking restore it themselves.
    pub async fn fetch_by_ids(
        pool: &PgPool,
        collection: Collection,
        ids: &[Uuid],
    ) -> Result<Vec<Resource>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE id = ANY($1)",
            columns_for(collection),
            collection.table_name()
        );

        let resources = match collection {
            Collection::HealthSpecialists => {
                sqlx::query_as::<_, HealthSpecialistRow>(&sql)
                    .bind(ids)
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .map(Resource::HealthSpecialist)
                    .collect()
            }
            Collection::Schools => {
                sqlx::query_as::<_, SchoolRow>(&sql)
                    .bind(ids)
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .map(Resource::School)
                    .collect()
            }
            Collection::OutdoorClubs => {
                sqlx::query_as::<_, OutdoorClubRow>(&sql)
                    .bind(ids)
                    .fetch_all(pool)
                    .await?
                    .into_iter()
                    .map(Resource::OutdoorClub)
                    .collect()
            }
        };

        Ok(resources)
    }

    /// Non-AI filtered query: case-insensitive substring on location,
    /// array overlap on the collection's tag column, store-default order,
    /// capped at `limit`.
    pub async fn filtered(
        pool: &PgPool,
        collection: Collection,
        filters: &SearchFilters,
        limit: i64,
    ) -> Result<Vec<Resource>, sqlx::Error> {
        let mut builder = filter_query(collection, filters, limit);

        let resources = match collection {
            Collection::HealthSpecialists => builder
                .build_query_as::<HealthSpecialistRow>()
                .fetch_all(pool)
                .await?
                .into_iter()
                .map(Resource::HealthSpecialist)
                .collect(),
            Collection::Schools => builder
                .build_query_as::<SchoolRow>()
                .fetch_all(pool)
                .await?
                .into_iter()
                .map(Resource::School)
                .collect(),
            Collection::OutdoorClubs => builder
                .build_query_as::<OutdoorClubRow>()
                .fetch_all(pool)
                .await?
                .into_iter()
                .map(Resource::OutdoorClub)
                .collect(),
        };

        Ok(resources)
    }

    pub async fn insert_health_specialist(
        pool: &PgPool,
        data: &NewHealthSpecialist,
        embedding: &str,
    ) -> Result<HealthSpecialistRow, sqlx::Error> {
        sqlx::query_as::<_, HealthSpecialistRow>(&format!(
            "INSERT INTO health_specialists \
             (name, specialty, location, services, bio, contact_email, contact_phone, embedding) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8::vector) \
             RETURNING {}",
            SPECIALIST_COLUMNS
        ))
        .bind(&data.name)
        .bind(&data.specialty)
        .bind(&data.location)
        .bind(&data.services)
        .bind(&data.bio)
        .bind(&data.contact_email)
        .bind(&data.contact_phone)
        .bind(embedding)
        .fetch_one(pool)
        .await
    }

    pub async fn insert_school(
        pool: &PgPool,
        data: &NewSchool,
        embedding: &str,
    ) -> Result<SchoolRow, sqlx::Error> {
        sqlx::query_as::<_, SchoolRow>(&format!(
            "INSERT INTO schools \
             (name, school_type, location, programs, description, contact_email, contact_phone, embedding) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8::vector) \
             RETURNING {}",
            SCHOOL_COLUMNS
        ))
        .bind(&data.name)
        .bind(&data.school_type)
        .bind(&data.location)
        .bind(&data.programs)
        .bind(&data.description)
        .bind(&data.contact_email)
        .bind(&data.contact_phone)
        .bind(embedding)
        .fetch_one(pool)
        .await
    }

    pub async fn insert_outdoor_club(
        pool: &PgPool,
        data: &NewOutdoorClub,
        embedding: &str,
    ) -> Result<OutdoorClubRow, sqlx::Error> {
        sqlx::query_as::<_, OutdoorClubRow>(&format!(
            "INSERT INTO outdoor_clubs \
             (name, location, activities, description, contact_email, contact_phone, embedding) \
             VALUES ($1, $2, $3, $4, $5, $6, $7::vector) \
             RETURNING {}",
            CLUB_COLUMNS
        ))
        .bind(&data.name)
        .bind(&data.location)
        .bind(&data.activities)
        .bind(&data.description)
        .bind(&data.contact_email)
        .bind(&data.contact_phone)
        .bind(embedding)
        .fetch_one(pool)
        .await
    }

    // Updates rewrite every attribute and the embedding in one statement,
    // so a stored embedding always reflects the current text fields.

    pub async fn update_health_specialist(
        pool: &PgPool,
        id: Uuid,
        data: &NewHealthSpecialist,
        embedding: &str,
    ) -> Result<Option<HealthSpecialistRow>, sqlx::Error> {
        sqlx::query_as::<_, HealthSpecialistRow>(&format!(
            "UPDATE health_specialists \
             SET name = $1, specialty = $2, location = $3, services = $4, bio = $5, \
                 contact_email = $6, contact_phone = $7, embedding = $8::vector \
             WHERE id = $9 \
             RETURNING {}",
            SPECIALIST_COLUMNS
        ))
        .bind(&data.name)
        .bind(&data.specialty)
        .bind(&data.location)
        .bind(&data.services)
        .bind(&data.bio)
        .bind(&data.contact_email)
        .bind(&data.contact_phone)
        .bind(embedding)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_school(
        pool: &PgPool,
        id: Uuid,
        data: &NewSchool,
        embedding: &str,
    ) -> Result<Option<SchoolRow>, sqlx::Error> {
        sqlx::query_as::<_, SchoolRow>(&format!(
            "UPDATE schools \
             SET name = $1, school_type = $2, location = $3, programs = $4, description = $5, \
                 contact_email = $6, contact_phone = $7, embedding = $8::vector \
             WHERE id = $9 \
             RETURNING {}",
            SCHOOL_COLUMNS
        ))
        .bind(&data.name)
        .bind(&data.school_type)
        .bind(&data.location)
        .bind(&data.programs)
        .bind(&data.description)
        .bind(&data.contact_email)
        .bind(&data.contact_phone)
        .bind(embedding)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_outdoor_club(
        pool: &PgPool,
        id: Uuid,
        data: &NewOutdoorClub,
        embedding: &str,
    ) -> Result<Option<OutdoorClubRow>, sqlx::Error> {
        sqlx::query_as::<_, OutdoorClubRow>(&format!(
            "UPDATE outdoor_clubs \
             SET name = $1, location = $2, activities = $3, description = $4, \
                 contact_email = $5, contact_phone = $6, embedding = $7::vector \
             WHERE id = $8 \
             RETURNING {}",
            CLUB_COLUMNS
        ))
        .bind(&data.name)
        .bind(&data.location)
        .bind(&data.activities)
        .bind(&data.description)
        .bind(&data.contact_email)
        .bind(&data.contact_phone)
        .bind(embedding)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Best-effort per-user search logging; the search path never depends
    /// on this succeeding.
    pub async fn insert_search_history(
        pool: &PgPool,
        user_id: Uuid,
        query: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO search_history (user_id, query) VALUES ($1, $2)")
            .bind(user_id)
            .bind(query)
            .execute(pool)
            .await?;

        Ok(())
    }
}

fn filter_query(
    collection: Collection,
    filters: &SearchFilters,
    limit: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
        "SELECT {} FROM {} WHERE TRUE",
        columns_for(collection),
        collection.table_name()
    ));

    if let Some(location) = &filters.location {
        builder.push(" AND location ILIKE ");
        builder.push_bind(format!("%{}%", location));
    }

    if !filters.tags.is_empty() {
        builder.push(format!(" AND {} && ", collection.tag_column()));
        builder.push_bind(filters.tags.clone());
    }

    if collection == Collection::Schools {
        if let Some(school_type) = &filters.school_type {
            builder.push(" AND school_type ILIKE ");
            builder.push_bind(format!("%{}%", school_type));
        }
    }

    builder.push(" LIMIT ");
    builder.push_bind(limit);

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_location_predicate() {
        let filters = SearchFilters {
            location: Some("Nairobi".to_string()),
            ..Default::default()
        };
        let builder = filter_query(Collection::HealthSpecialists, &filters, 10);
        let sql = builder.sql();

        assert!(sql.contains("FROM health_specialists"));
        assert!(sql.contains("location ILIKE $1"));
        assert!(sql.contains("LIMIT $2"));
    }

    #[test]
    fn test_filter_query_tag_overlap_uses_collection_column() {
        let filters = SearchFilters {
            tags: vec!["Hiking".to_string()],
            ..Default::default()
        };
        let builder = filter_query(Collection::OutdoorClubs, &filters, 10);
        let sql = builder.sql();

        assert!(sql.contains("activities && $1"));
    }

    #[test]
    fn test_filter_query_school_type_only_applies_to_schools() {
        let filters = SearchFilters {
            school_type: Some("Special Needs".to_string()),
            ..Default::default()
        };

        let schools_sql = filter_query(Collection::Schools, &filters, 10).sql().to_string();
        assert!(schools_sql.contains("school_type ILIKE"));

        let clubs_sql = filter_query(Collection::OutdoorClubs, &filters, 10).sql().to_string();
        assert!(!clubs_sql.contains("school_type"));
    }

    #[test]
    fn test_filter_query_no_predicates_still_caps_results() {
        let builder = filter_query(Collection::Schools, &SearchFilters::default(), 10);
        let sql = builder.sql();

        assert!(sql.contains("WHERE TRUE LIMIT $1"));
    }
}
