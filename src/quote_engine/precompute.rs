// Precomputation Scheduler
//
// Evaluates the authoritative pricer across a fixed grid of common
// scenarios (typical participant counts x near-future dates, no extras) and
// seeds the cache with one table per excursion, turning the hot path into a
// single lookup. Rebuilds run on a background worker fed by a job queue so
// the request that notices a stale table never waits for it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::quote_engine::cache_store::CacheStore;
use crate::quote_engine::collaborators::{AuthoritativePricer, PopularitySource, PricingResult};
use crate::quote_engine::error::{QEResult, QuoteEngineError};
use crate::quote_engine::fingerprint::{fingerprint, QuoteRequest};

/// Participant counts covered by the scenario grid
const PARTICIPANT_GRID: [u32; 5] = [1, 2, 4, 6, 10];
/// Near-future date offsets covered by the scenario grid, in days
const DATE_OFFSET_DAYS: [i64; 3] = [7, 14, 30];

/// Lifetime of a precomputed table (24 hours)
const PRECOMPUTED_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Lifetime of the duplicate-submission guard marker
const PENDING_MARKER_TTL: Duration = Duration::from_secs(10 * 60);
/// How many popular excursions a full rebuild covers
const POPULAR_REBUILD_LIMIT: i64 = 20;

/// Cache key of an excursion's precomputed table
pub fn table_key(excursion_id: i32) -> String {
    format!("precomputed:v1:{}", excursion_id)
}

fn pending_key(excursion_id: i32) -> String {
    format!("precomputed:pending:{}", excursion_id)
}

/// Precomputed pricing table for one excursion
///
/// Maps scenario keys to authoritative results. The table is written whole
/// in a single cache set per rebuild and is never partially invalidated.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrecomputedScenarioSet {
    pub scenarios: HashMap<String, PricingResult>,
    pub rebuilt_at: DateTime<Utc>,
}

/// Work items for the precompute worker
#[derive(Debug)]
pub(crate) enum PrecomputeJob {
    Rebuild(Vec<i32>),
    RebuildPopular,
}

/// Handle for submitting precompute work
///
/// Submission is message passing to the worker task; callers never block on
/// grid evaluation.
#[derive(Clone)]
pub struct PrecomputeScheduler {
    tx: mpsc::UnboundedSender<PrecomputeJob>,
    cache: Arc<dyn CacheStore>,
}

impl PrecomputeScheduler {
    /// Spawn the worker task and return the submission handle
    pub fn spawn(
        pricer: Arc<dyn AuthoritativePricer>,
        cache: Arc<dyn CacheStore>,
        popularity: Arc<dyn PopularitySource>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = PrecomputeWorker {
            pricer,
            cache: cache.clone(),
            popularity,
        };
        tokio::spawn(worker.run(rx));

        Self { tx, cache }
    }

    /// Scheduler with no worker attached; submitted jobs stay observable on
    /// the returned receiver
    #[cfg(test)]
    pub(crate) fn detached(
        cache: Arc<dyn CacheStore>,
    ) -> (Self, mpsc::UnboundedReceiver<PrecomputeJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cache }, rx)
    }

    /// Request a rebuild of one excursion's table
    ///
    /// Guarded by a short-TTL pending marker so that a burst of requests
    /// noticing the same stale table submits a single job. Best-effort: a
    /// failed marker read just means a duplicate job, which the worker
    /// tolerates.
    pub async fn request_rebuild(&self, excursion_id: i32) {
        if let Ok(Some(_)) = self.cache.get(&pending_key(excursion_id)).await {
            return;
        }
        if let Err(e) = self
            .cache
            .set(&pending_key(excursion_id), "1", PENDING_MARKER_TTL)
            .await
        {
            tracing::warn!("Could not set precompute pending marker: {}", e);
        }

        if self.tx.send(PrecomputeJob::Rebuild(vec![excursion_id])).is_err() {
            tracing::error!("Precompute worker is gone, dropping rebuild request");
        }
    }

    /// Request a rebuild of the popular-excursion set
    pub fn request_popular_rebuild(&self) {
        if self.tx.send(PrecomputeJob::RebuildPopular).is_err() {
            tracing::error!("Precompute worker is gone, dropping popular rebuild");
        }
    }

    /// Spawn the daily refresh tick for the popular set
    pub fn spawn_daily_refresh(&self) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRECOMPUTED_TTL);
            loop {
                interval.tick().await;
                scheduler.request_popular_rebuild();
            }
        });
    }
}

/// Background worker that evaluates the scenario grid
struct PrecomputeWorker {
    pricer: Arc<dyn AuthoritativePricer>,
    cache: Arc<dyn CacheStore>,
    popularity: Arc<dyn PopularitySource>,
}

impl PrecomputeWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<PrecomputeJob>) {
        tracing::info!("Precompute worker started");
        while let Some(job) = rx.recv().await {
            self.handle(job).await;
        }
        tracing::info!("Precompute worker stopped");
    }

    async fn handle(&self, job: PrecomputeJob) {
        match job {
            PrecomputeJob::Rebuild(excursion_ids) => {
                for excursion_id in excursion_ids {
                    match self.rebuild_excursion(excursion_id).await {
                        Ok(count) => tracing::info!(
                            "Precomputed {} scenarios for excursion {}",
                            count,
                            excursion_id
                        ),
                        Err(e) => tracing::warn!(
                            "Precompute rebuild failed for excursion {}: {}",
                            excursion_id,
                            e
                        ),
                    }
                }
            }
            PrecomputeJob::RebuildPopular => {
                match self.popularity.popular_excursions(POPULAR_REBUILD_LIMIT).await {
                    Ok(ids) => {
                        tracing::info!("Rebuilding precomputed tables for {} excursions", ids.len());
                        for excursion_id in ids {
                            if let Err(e) = self.rebuild_excursion(excursion_id).await {
                                tracing::warn!(
                                    "Precompute rebuild failed for excursion {}: {}",
                                    excursion_id,
                                    e
                                );
                            }
                        }
                    }
                    Err(e) => tracing::warn!("Popularity ranking unavailable: {}", e),
                }
            }
        }
    }

    /// Price the full grid for one excursion and replace its table atomically
    async fn rebuild_excursion(&self, excursion_id: i32) -> QEResult<usize> {
        let today = Utc::now().date_naive();
        let mut table = PrecomputedScenarioSet {
            scenarios: HashMap::new(),
            rebuilt_at: Utc::now(),
        };

        for request in grid_requests(excursion_id, today) {
            let key = fingerprint(&request)?;
            match self.pricer.compute(&request).await {
                Ok(result) => {
                    table.scenarios.insert(key.as_hex().to_string(), result);
                }
                Err(QuoteEngineError::ExcursionNotFound(id)) => {
                    // Product is gone; drop whatever table it still has
                    self.cache.delete(&table_key(id)).await.ok();
                    return Err(QuoteEngineError::ExcursionNotFound(id));
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping grid cell for excursion {} ({} participants, {}): {}",
                        excursion_id,
                        request.participant_count,
                        request.start_date,
                        e
                    );
                }
            }
        }

        let count = table.scenarios.len();
        if count > 0 {
            let serialized = serde_json::to_string(&table)?;
            self.cache
                .set(&table_key(excursion_id), &serialized, PRECOMPUTED_TTL)
                .await?;
        }
        self.cache.delete(&pending_key(excursion_id)).await.ok();

        Ok(count)
    }
}

/// The fixed scenario grid for one excursion
///
/// Popular participant counts crossed with near-future start dates, no
/// extras or activities.
fn grid_requests(excursion_id: i32, today: NaiveDate) -> Vec<QuoteRequest> {
    let mut requests = Vec::with_capacity(PARTICIPANT_GRID.len() * DATE_OFFSET_DAYS.len());
    for &participant_count in &PARTICIPANT_GRID {
        for &offset in &DATE_OFFSET_DAYS {
            requests.push(QuoteRequest {
                excursion_id,
                participant_count,
                start_date: today + chrono::Duration::days(offset),
                end_date: None,
                extras: Vec::new(),
                activities: Vec::new(),
            });
        }
    }
    requests
}
