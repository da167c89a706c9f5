// Test doubles for the quote engine
//
// Scriptable collaborators injected through the same seams production uses.
// The harness keeps the precompute scheduler detached so background rebuilds
// never race test assertions.

use axum::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::quote_engine::cache_store::{CacheStore, InMemoryCacheStore};
use crate::quote_engine::collaborators::{
    AuthoritativePricer, BookingIndex, BookingRecord, ExcursionCatalog, ExcursionInfo,
    PricingResult,
};
use crate::quote_engine::error::{QEResult, QuoteEngineError};
use crate::quote_engine::fingerprint::{fingerprint, QuoteRequest};
use crate::quote_engine::precompute::{self, PrecomputeJob, PrecomputeScheduler};
use crate::quote_engine::types::ApproximationReason;
use crate::quote_engine::{PrecomputedScenarioSet, QuoteEngine};

pub(crate) struct ScriptedPricer {
    rate: Decimal,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicU64,
}

#[async_trait]
impl AuthoritativePricer for ScriptedPricer {
    async fn compute(&self, request: &QuoteRequest) -> QEResult<PricingResult> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(QuoteEngineError::UpstreamUnavailable(
                "scripted pricer failure".to_string(),
            ));
        }

        let price_per_person = self.rate * Decimal::from(request.day_count());
        Ok(PricingResult {
            price_per_person,
            base_price: self.rate,
            extras_breakdown: vec![],
            activities_breakdown: vec![],
            vehicle_price: Decimal::ZERO,
            total_price: price_per_person * Decimal::from(request.participant_count),
            participant_count: request.participant_count,
            day_count: request.day_count(),
            is_approximation: false,
            approximation_reason: ApproximationReason::None,
            computed_at: Utc::now(),
        })
    }
}

pub(crate) struct ScriptedCatalog {
    base_price: Decimal,
    max_capacity: Option<i32>,
    fail: bool,
}

#[async_trait]
impl ExcursionCatalog for ScriptedCatalog {
    async fn excursion(&self, excursion_id: i32) -> QEResult<ExcursionInfo> {
        if self.fail {
            return Err(QuoteEngineError::UpstreamUnavailable(
                "scripted catalog failure".to_string(),
            ));
        }
        Ok(ExcursionInfo {
            id: excursion_id,
            base_price: self.base_price,
            max_capacity: self.max_capacity,
            display_stock: true,
            stock_threshold: 5,
            is_peak_season: false,
        })
    }
}

pub(crate) struct ScriptedIndex {
    booked: i64,
    fail: bool,
}

#[async_trait]
impl BookingIndex for ScriptedIndex {
    async fn booked_rollup(&self, _excursion_id: i32, _date: NaiveDate) -> QEResult<Option<i64>> {
        if self.fail {
            return Err(QuoteEngineError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(Some(self.booked))
    }

    async fn booking_records(
        &self,
        _excursion_id: i32,
        _date: NaiveDate,
    ) -> QEResult<Vec<BookingRecord>> {
        if self.fail {
            return Err(QuoteEngineError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(vec![BookingRecord {
            id: Uuid::new_v4(),
            participant_count: self.booked as i32,
        }])
    }
}

/// Fully wired engine over scriptable doubles
pub(crate) struct EngineHarness {
    pub engine: Arc<QuoteEngine>,
    pub cache: Arc<InMemoryCacheStore>,
    pricer: Arc<ScriptedPricer>,
    _rebuild_rx: mpsc::UnboundedReceiver<PrecomputeJob>,
}

impl EngineHarness {
    pub fn builder() -> EngineHarnessBuilder {
        EngineHarnessBuilder::default()
    }

    /// Times the scripted authoritative pricer has run
    pub fn pricer_calls(&self) -> u64 {
        self.pricer.calls.load(Ordering::Relaxed)
    }

    /// Seed a precomputed table containing exactly this scenario
    pub async fn seed_precomputed_table(&self, request: &QuoteRequest, price_per_person: Decimal) {
        let key = fingerprint(request).expect("seed request must be valid");
        let result = PricingResult {
            price_per_person,
            base_price: price_per_person,
            extras_breakdown: vec![],
            activities_breakdown: vec![],
            vehicle_price: Decimal::ZERO,
            total_price: price_per_person * Decimal::from(request.participant_count),
            participant_count: request.participant_count,
            day_count: request.day_count(),
            is_approximation: false,
            approximation_reason: ApproximationReason::None,
            computed_at: Utc::now(),
        };

        let mut table = PrecomputedScenarioSet {
            scenarios: std::collections::HashMap::new(),
            rebuilt_at: Utc::now(),
        };
        table.scenarios.insert(key.as_hex().to_string(), result);

        self.cache
            .set(
                &precompute::table_key(request.excursion_id),
                &serde_json::to_string(&table).unwrap(),
                Duration::from_secs(24 * 60 * 60),
            )
            .await
            .unwrap();
    }
}

pub(crate) struct EngineHarnessBuilder {
    base_price: Decimal,
    authoritative_rate: Decimal,
    max_capacity: Option<i32>,
    booked: i64,
    pricer_delay: Option<Duration>,
    pricer_fails: bool,
    catalog_fails: bool,
    index_fails: bool,
}

impl Default for EngineHarnessBuilder {
    fn default() -> Self {
        Self {
            base_price: dec!(50000),
            authoritative_rate: dec!(45000),
            max_capacity: Some(20),
            booked: 5,
            pricer_delay: None,
            pricer_fails: false,
            catalog_fails: false,
            index_fails: false,
        }
    }
}

impl EngineHarnessBuilder {
    pub fn pricer_delay(mut self, delay: Duration) -> Self {
        self.pricer_delay = Some(delay);
        self
    }

    pub fn pricer_fails(mut self, fail: bool) -> Self {
        self.pricer_fails = fail;
        self
    }

    pub fn catalog_fails(mut self, fail: bool) -> Self {
        self.catalog_fails = fail;
        self
    }

    pub fn index_fails(mut self, fail: bool) -> Self {
        self.index_fails = fail;
        self
    }

    pub fn max_capacity(mut self, max_capacity: Option<i32>) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn booked(mut self, booked: i64) -> Self {
        self.booked = booked;
        self
    }

    pub fn build(self) -> EngineHarness {
        let cache = Arc::new(InMemoryCacheStore::new());
        let pricer = Arc::new(ScriptedPricer {
            rate: self.authoritative_rate,
            delay: self.pricer_delay,
            fail: self.pricer_fails,
            calls: AtomicU64::new(0),
        });
        let catalog = Arc::new(ScriptedCatalog {
            base_price: self.base_price,
            max_capacity: self.max_capacity,
            fail: self.catalog_fails,
        });
        let index = Arc::new(ScriptedIndex {
            booked: self.booked,
            fail: self.index_fails,
        });

        let (scheduler, rebuild_rx) =
            PrecomputeScheduler::detached(cache.clone() as Arc<dyn CacheStore>);
        let engine = QuoteEngine::with_scheduler(
            pricer.clone(),
            catalog,
            index,
            cache.clone(),
            scheduler,
        );

        EngineHarness {
            engine: Arc::new(engine),
            cache,
            pricer,
            _rebuild_rx: rebuild_rx,
        }
    }
}
