use crate::error::ApiError;
use crate::models::Excursion;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Creates and configures a PostgreSQL connection pool
///
/// # Arguments
/// * `database_url` - PostgreSQL connection string
///
/// # Returns
/// * `Result<DbPool>` - Configured connection pool or error
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    tracing::debug!("Creating database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}

/// Fetch a single excursion by id
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `excursion_id` - Excursion to load
///
/// # Returns
/// * `Result<Excursion, ApiError>` - The excursion, or NotFound
pub async fn fetch_excursion(pool: &PgPool, excursion_id: i32) -> Result<Excursion, ApiError> {
    tracing::debug!("Fetching excursion with id: {}", excursion_id);

    let excursion = sqlx::query_as::<_, Excursion>(
        r#"
        SELECT id, name, description, base_price, vehicle_price, max_capacity,
               display_stock, stock_threshold, is_peak_season, published,
               published_at, created_at, updated_at
        FROM excursions
        WHERE id = $1
        "#,
    )
    .bind(excursion_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound {
        resource: "Excursion".to_string(),
        id: excursion_id.to_string(),
    })?;

    Ok(excursion)
}
