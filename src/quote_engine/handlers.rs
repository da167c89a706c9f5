// HTTP handlers for the quote engine endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::quote_engine::{
    CapacityMemo, CapacityResult, LineSelection, NetworkContext, NetworkQuality, QuoteEngineError,
    QuoteOutcome, QuoteRequest,
};

/// Request DTO for price resolution
#[derive(Debug, Deserialize, Validate)]
pub struct QuoteRequestDto {
    pub excursion_id: i32,
    #[validate(range(min = 1, max = 500))]
    pub participant_count: u32,
    #[validate(custom = "crate::validation::validate_booking_window")]
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub extras: Vec<LineSelection>,
    #[serde(default)]
    pub activities: Vec<LineSelection>,
    /// Client-reported connectivity, defaults to normal
    #[serde(default)]
    pub network_quality: NetworkQuality,
}

impl QuoteRequestDto {
    fn into_parts(self) -> (QuoteRequest, NetworkContext) {
        let network = NetworkContext::new(self.network_quality);
        let request = QuoteRequest {
            excursion_id: self.excursion_id,
            participant_count: self.participant_count,
            start_date: self.start_date,
            end_date: self.end_date,
            extras: self.extras,
            activities: self.activities,
        };
        (request, network)
    }
}

/// Query parameters for availability checks
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub participants: u32,
}

/// Response DTO for availability checks
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub excursion_id: i32,
    pub date: NaiveDate,
    pub requested_participants: u32,
    #[serde(flatten)]
    pub capacity: CapacityResult,
}

/// Handler for POST /api/quotes
///
/// Resolves a price through the fallback chain. Degraded clients whose
/// approximation also failed receive the minimal fallback envelope with
/// status 200: an answer they can render beats an error they cannot.
pub async fn resolve_quote_handler(
    State(state): State<crate::AppState>,
    Json(payload): Json<QuoteRequestDto>,
) -> Result<Response, QuoteEngineError> {
    payload
        .validate()
        .map_err(|e| QuoteEngineError::InvalidRequest(e.to_string()))?;

    let (request, network) = payload.into_parts();
    tracing::debug!(
        "Resolving quote for excursion {} ({} participants, quality {})",
        request.excursion_id,
        request.participant_count,
        network.quality
    );

    match state
        .engine
        .resolve_quote_or_fallback(&request, network)
        .await?
    {
        QuoteOutcome::Priced(result) => Ok((StatusCode::OK, Json(result)).into_response()),
        QuoteOutcome::Fallback(notice) => Ok((StatusCode::OK, Json(notice)).into_response()),
    }
}

/// Handler for GET /api/excursions/:id/availability
///
/// Always authoritative; a fresh capacity memo scopes deduplication to this
/// request.
pub async fn resolve_availability_handler(
    State(state): State<crate::AppState>,
    Path(excursion_id): Path<i32>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, QuoteEngineError> {
    let mut memo = CapacityMemo::new();

    let capacity = state
        .engine
        .resolve_availability(&mut memo, excursion_id, query.date, query.participants)
        .await?;

    Ok(Json(AvailabilityResponse {
        excursion_id,
        date: query.date,
        requested_participants: query.participants,
        capacity,
    }))
}

/// Handler for POST /api/excursions/:id/invalidate
///
/// Invalidation hook for external price/capacity changes.
pub async fn invalidate_handler(
    State(state): State<crate::AppState>,
    Path(excursion_id): Path<i32>,
) -> Result<StatusCode, QuoteEngineError> {
    state.engine.invalidate(excursion_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /api/engine/metrics
pub async fn metrics_handler(State(state): State<crate::AppState>) -> Json<serde_json::Value> {
    let summary = state.engine.metrics().summary();

    Json(serde_json::json!({
        "cache": {
            "hit_rate": format!("{:.1}%", summary.cache_hit_rate * 100.0),
            "precomputed_hits": summary.precomputed_hits,
            "hits": summary.cache_hits,
            "misses": summary.cache_misses,
        },
        "fallbacks": {
            "approximations": summary.approximations,
            "authoritative_calls": summary.authoritative_calls,
            "minimal_envelopes": summary.fallback_envelopes,
        },
        "quotes": {
            "resolutions": summary.quote_resolutions,
            "avg_time_ms": format!("{:.2}", summary.avg_quote_time_ms),
            "slow_operations": summary.slow_quote_resolutions,
        },
        "capacity": {
            "checks": summary.capacity_checks,
            "avg_time_ms": format!("{:.2}", summary.avg_capacity_time_ms),
            "slow_operations": summary.slow_capacity_checks,
        },
    }))
}
