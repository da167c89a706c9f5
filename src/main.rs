mod db;
mod error;
mod models;
mod quote_engine;
mod validation;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use error::ApiError;
use models::Excursion;
use quote_engine::{
    CacheStore, InMemoryCacheStore, PgAuthoritativePricer, PgBookingIndex, PgExcursionCatalog,
    PgPopularitySource, QuoteEngine, RedisCacheStore,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        get_excursion_by_id,
    ),
    components(
        schemas(Excursion)
    ),
    tags(
        (name = "excursions", description = "Excursion catalog endpoints")
    ),
    info(
        title = "Excursion Booking API",
        version = "1.0.0",
        description = "Quote and availability API for excursion bookings",
        contact(
            name = "API Support",
            email = "support@excursionapi.com"
        )
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    db: PgPool,
    engine: Arc<QuoteEngine>,
}

/// Handler for GET /api/excursions/:id
/// Retrieves a specific excursion by ID
#[utoipa::path(
    get,
    path = "/api/excursions/{id}",
    params(
        ("id" = i32, Path, description = "Excursion ID")
    ),
    responses(
        (status = 200, description = "Excursion found", body = Excursion),
        (status = 404, description = "Excursion not found", body = String, example = json!({"error_code": "NOT_FOUND"})),
        (status = 500, description = "Internal server error", body = String, example = json!({"error_code": "DATABASE_ERROR"}))
    ),
    tag = "excursions"
)]
async fn get_excursion_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Excursion>, ApiError> {
    let excursion = db::fetch_excursion(&state.db, id).await?;

    tracing::debug!("Successfully retrieved excursion: {}", excursion.name);
    Ok(Json(excursion))
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Catalog routes
        .route("/api/excursions/:id", get(get_excursion_by_id))
        // Quote engine routes
        .route("/api/quotes", post(quote_engine::handlers::resolve_quote_handler))
        .route(
            "/api/excursions/:id/availability",
            get(quote_engine::handlers::resolve_availability_handler),
        )
        .route(
            "/api/excursions/:id/invalidate",
            post(quote_engine::handlers::invalidate_handler),
        )
        .route("/api/engine/metrics", get(quote_engine::handlers::metrics_handler))
        .layer(cors)
        .with_state(state)
}

/// Build the durable cache store from the environment
///
/// Redis is the shared store in production; without a configured REDIS_URL
/// the process falls back to a per-instance in-memory store, which is only
/// acceptable for single-node deployments.
async fn create_cache_store() -> Arc<dyn CacheStore> {
    match std::env::var("REDIS_URL") {
        Ok(redis_url) => match RedisCacheStore::connect(&redis_url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!("Redis unavailable ({}), using in-memory cache store", e);
                Arc::new(InMemoryCacheStore::new())
            }
        },
        Err(_) => {
            tracing::warn!("REDIS_URL not set, using in-memory cache store");
            Arc::new(InMemoryCacheStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Excursion API - Starting...");

    // Get configuration from environment variables
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Assemble the quote engine with its Postgres collaborators
    let cache = create_cache_store().await;
    let engine = Arc::new(QuoteEngine::new(
        Arc::new(PgAuthoritativePricer::new(db_pool.clone())),
        Arc::new(PgExcursionCatalog::new(db_pool.clone())),
        Arc::new(PgBookingIndex::new(db_pool.clone())),
        Arc::new(PgPopularitySource::new(db_pool.clone())),
        cache,
    ));

    // Seed precomputed tables for the popular set and keep them fresh daily
    engine.warm();
    engine.scheduler().spawn_daily_refresh();

    // Create the application router
    let app = create_router(AppState {
        db: db_pool,
        engine,
    });

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Excursion API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}

#[cfg(test)]
mod tests;
