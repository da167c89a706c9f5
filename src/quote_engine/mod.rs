// Quote Engine
//
// Adaptive pricing and availability engine for excursion bookings.
// Answers "what does this booking cost, and is this date available?" even
// when the client's connection is slow, intermittent, or offline:
// - Scenario fingerprinting turns requests into canonical cache keys
// - A durable TTL cache and precomputed tables shield the authoritative
//   pricing computation
// - A heuristic approximation keeps degraded clients answerable
// - Capacity checks stay authoritative; overbooking is never approximated
//
// The engine is stateless apart from its injected collaborators and holds no
// global mutable state; the only request-scoped state is the capacity memo
// its callers create per request.

pub mod approximation;
pub mod cache_store;
pub mod capacity;
pub mod collaborators;
pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod metrics;
pub mod precompute;
pub mod ttl_policy;
pub mod types;

// Re-export commonly used types for convenience
pub use approximation::ApproximationEngine;
pub use cache_store::{CacheStore, InMemoryCacheStore, RedisCacheStore};
pub use capacity::{CapacityAggregator, CapacityMemo, CapacityResult};
pub use collaborators::{
    AuthoritativePricer, BookingIndex, BookingRecord, ExcursionCatalog, ExcursionInfo,
    PgAuthoritativePricer, PgBookingIndex, PgExcursionCatalog, PgPopularitySource, PopularitySource,
    PriceLine, PricingResult,
};
pub use error::{QEResult, QuoteEngineError};
pub use fingerprint::{fingerprint, LineSelection, QuoteRequest, ScenarioFingerprint};
pub use metrics::EngineMetrics;
pub use precompute::{PrecomputeScheduler, PrecomputedScenarioSet};
pub use ttl_policy::CacheDurationPolicy;
pub use types::{ApproximationReason, NetworkContext, NetworkQuality, StockStatus};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Timeout on the authoritative pricer for clients that reported any
/// degraded quality: a slow client should not also wait on a slow server
const DEGRADED_PRICER_TIMEOUT: Duration = Duration::from_secs(2);

/// Cache key of one priced scenario, namespaced per excursion so price
/// changes can invalidate a single product's entries
fn scenario_key(excursion_id: i32, key: &ScenarioFingerprint) -> String {
    format!("quote:v1:{}:{}", excursion_id, key.as_hex())
}

/// Minimal response envelope for degraded clients
///
/// Returned only when even the approximation path failed; carries no pricing
/// breakdown so it stays transmittable over the worst connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackNotice {
    pub status: String,
    pub message: String,
    pub is_fallback: bool,
    pub timestamp: DateTime<Utc>,
}

impl FallbackNotice {
    fn new(message: &str) -> Self {
        Self {
            status: "degraded".to_string(),
            message: message.to_string(),
            is_fallback: true,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of a resilient quote resolution
#[derive(Debug, Clone)]
pub enum QuoteOutcome {
    Priced(PricingResult),
    Fallback(FallbackNotice),
}

/// Request Dispatcher
///
/// Orders the fallback chain (precomputed table, durable cache, then
/// approximate or authoritative computation), stores fresh results under the
/// adaptive TTL, and shapes the minimal envelope for degraded clients.
/// All collaborators are injected, so tests run against doubles.
pub struct QuoteEngine {
    pricer: Arc<dyn AuthoritativePricer>,
    catalog: Arc<dyn ExcursionCatalog>,
    cache: Arc<dyn CacheStore>,
    ttl_policy: CacheDurationPolicy,
    approximation: ApproximationEngine,
    capacity: CapacityAggregator,
    scheduler: PrecomputeScheduler,
    metrics: EngineMetrics,
}

impl QuoteEngine {
    /// Create a new QuoteEngine and spawn its precompute worker
    pub fn new(
        pricer: Arc<dyn AuthoritativePricer>,
        catalog: Arc<dyn ExcursionCatalog>,
        booking_index: Arc<dyn BookingIndex>,
        popularity: Arc<dyn PopularitySource>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let scheduler = PrecomputeScheduler::spawn(pricer.clone(), cache.clone(), popularity);
        Self::with_scheduler(pricer, catalog, booking_index, cache, scheduler)
    }

    /// Create a QuoteEngine around an existing scheduler handle
    pub fn with_scheduler(
        pricer: Arc<dyn AuthoritativePricer>,
        catalog: Arc<dyn ExcursionCatalog>,
        booking_index: Arc<dyn BookingIndex>,
        cache: Arc<dyn CacheStore>,
        scheduler: PrecomputeScheduler,
    ) -> Self {
        Self {
            approximation: ApproximationEngine::new(catalog.clone()),
            capacity: CapacityAggregator::new(catalog.clone(), booking_index),
            ttl_policy: CacheDurationPolicy::new(),
            metrics: EngineMetrics::new(),
            pricer,
            catalog,
            cache,
            scheduler,
        }
    }

    /// Get engine metrics
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Handle to the precompute scheduler (daily refresh wiring)
    pub fn scheduler(&self) -> &PrecomputeScheduler {
        &self.scheduler
    }

    /// Warm the precomputed tables for the popular excursion set
    ///
    /// Called on startup; the rebuild runs on the worker, so this returns
    /// immediately.
    pub fn warm(&self) {
        tracing::info!("Warming precomputed quote tables...");
        self.scheduler.request_popular_rebuild();
    }

    /// Resolve a price for the scenario
    ///
    /// Resolution order, first hit wins:
    /// 1. Validate (via fingerprinting; malformed input fails fast)
    /// 2. Precomputed scenario table
    /// 3. Durable scenario cache
    /// 4. Approximation for very_slow/offline clients, authoritative
    ///    computation otherwise; the result is stored under the policy TTL
    pub async fn resolve_quote(
        &self,
        request: &QuoteRequest,
        network: NetworkContext,
    ) -> QEResult<PricingResult> {
        let _timer = self.metrics.start_quote_resolution();
        let key = fingerprint(request)?;

        if let Some(result) = self.precomputed_lookup(request, &key).await {
            self.metrics.record_precomputed_hit();
            tracing::debug!("Precomputed hit for scenario {}", key);
            return Ok(result);
        }

        if let Some(result) = self.cached_lookup(request.excursion_id, &key).await {
            self.metrics.record_cache_hit();
            tracing::debug!("Cache hit for scenario {}", key);
            return Ok(result);
        }
        self.metrics.record_cache_miss();

        let result = self.compute_fresh(request, network).await?;
        self.store_result(request, network, &key, &result).await;

        Ok(result)
    }

    /// Resolve a price, degrading to the minimal envelope when necessary
    ///
    /// For clients that reported very_slow/offline quality, any residual
    /// failure other than invalid input or an unknown product becomes the
    /// minimal fallback envelope instead of an error: a degraded client must
    /// always get an answer it can render.
    pub async fn resolve_quote_or_fallback(
        &self,
        request: &QuoteRequest,
        network: NetworkContext,
    ) -> QEResult<QuoteOutcome> {
        match self.resolve_quote(request, network).await {
            Ok(result) => Ok(QuoteOutcome::Priced(result)),
            Err(e) if network.quality.prefers_approximation() && e.is_recoverable() => {
                tracing::warn!(
                    "Quote for excursion {} degraded to fallback envelope: {}",
                    request.excursion_id,
                    e
                );
                self.metrics.record_fallback_envelope();
                Ok(QuoteOutcome::Fallback(FallbackNotice::new(
                    "Price estimate unavailable, please retry when back online",
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve remaining capacity for an excursion date
    ///
    /// Capacity is authoritative: there is no approximation branch, and
    /// upstream failures surface to the caller. The memo deduplicates
    /// repeated questions within one request.
    pub async fn resolve_availability(
        &self,
        memo: &mut CapacityMemo,
        excursion_id: i32,
        date: NaiveDate,
        requested_participants: u32,
    ) -> QEResult<CapacityResult> {
        if excursion_id <= 0 {
            return Err(QuoteEngineError::InvalidRequest(format!(
                "excursion_id must be positive, got {}",
                excursion_id
            )));
        }
        if requested_participants < 1 {
            return Err(QuoteEngineError::InvalidRequest(
                "participants must be at least 1".to_string(),
            ));
        }

        let _timer = self.metrics.start_capacity_check();
        self.capacity
            .capacity(memo, excursion_id, date, requested_participants)
            .await
    }

    /// Drop every cached price for an excursion
    ///
    /// Invalidation hook for external price/capacity changes (admin edits,
    /// season flips). Removes the precomputed table and the product's
    /// scenario-cache namespace.
    pub async fn invalidate(&self, excursion_id: i32) -> QEResult<()> {
        tracing::info!("Invalidating cached quotes for excursion {}", excursion_id);
        self.cache
            .delete(&precompute::table_key(excursion_id))
            .await?;
        self.cache
            .delete_prefix(&format!("quote:v1:{}:", excursion_id))
            .await?;
        Ok(())
    }

    /// Look up the scenario in the excursion's precomputed table
    ///
    /// An absent table triggers a deferred rebuild; the current request
    /// proceeds down the chain without waiting.
    async fn precomputed_lookup(
        &self,
        request: &QuoteRequest,
        key: &ScenarioFingerprint,
    ) -> Option<PricingResult> {
        let table_json = match self.cache.get(&precompute::table_key(request.excursion_id)).await {
            Ok(Some(json)) => json,
            Ok(None) => {
                self.scheduler.request_rebuild(request.excursion_id).await;
                return None;
            }
            Err(e) => {
                tracing::warn!("Precomputed table read failed, treating as miss: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<PrecomputedScenarioSet>(&table_json) {
            Ok(table) => table.scenarios.get(key.as_hex()).cloned(),
            Err(e) => {
                tracing::warn!("Discarding unreadable precomputed table: {}", e);
                self.cache
                    .delete(&precompute::table_key(request.excursion_id))
                    .await
                    .ok();
                None
            }
        }
    }

    /// Look up the scenario in the durable cache; failures degrade to a miss
    async fn cached_lookup(
        &self,
        excursion_id: i32,
        key: &ScenarioFingerprint,
    ) -> Option<PricingResult> {
        match self.cache.get(&scenario_key(excursion_id, key)).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    /// Compute a fresh result for a cache miss
    ///
    /// Degraded clients go straight to the approximation. Everyone else gets
    /// the authoritative computation, time-boxed for clients that reported
    /// any slowness, with the approximation as the recovery path: a pricing
    /// display must answer something whenever it validly can.
    async fn compute_fresh(
        &self,
        request: &QuoteRequest,
        network: NetworkContext,
    ) -> QEResult<PricingResult> {
        if network.quality.prefers_approximation() {
            self.metrics.record_approximation();
            return self
                .approximation
                .approximate(
                    request.excursion_id,
                    request.participant_count,
                    request.start_date,
                    ApproximationReason::from(network.quality),
                )
                .await;
        }

        self.metrics.record_authoritative_call();
        let outcome = if network.quality == NetworkQuality::Normal {
            self.pricer.compute(request).await
        } else {
            match tokio::time::timeout(DEGRADED_PRICER_TIMEOUT, self.pricer.compute(request)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(QuoteEngineError::UpstreamUnavailable(format!(
                    "authoritative pricer exceeded {:?}",
                    DEGRADED_PRICER_TIMEOUT
                ))),
            }
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    "Authoritative pricing failed for excursion {}, approximating: {}",
                    request.excursion_id,
                    e
                );
                self.metrics.record_approximation();
                self.approximation
                    .approximate(
                        request.excursion_id,
                        request.participant_count,
                        request.start_date,
                        ApproximationReason::VerySlow,
                    )
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Store a fresh result under the policy TTL; failures only warn
    async fn store_result(
        &self,
        request: &QuoteRequest,
        network: NetworkContext,
        key: &ScenarioFingerprint,
        result: &PricingResult,
    ) {
        let is_peak_season = match self.catalog.excursion(request.excursion_id).await {
            Ok(info) => info.is_peak_season,
            Err(_) => false,
        };
        let ttl = self
            .ttl_policy
            .duration(network.quality, is_peak_season, Local::now().naive_local());

        let json = match serde_json::to_string(result) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Could not serialize quote for caching: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .cache
            .set(&scenario_key(request.excursion_id, key), &json, ttl)
            .await
        {
            tracing::warn!("Cache write failed for scenario {}: {}", key, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing;
