// Capacity Aggregator
//
// Computes remaining booking capacity for an excursion on a date and
// classifies it into a stock status. Capacity is never approximated: a wrong
// "available" answer risks overbooking, so upstream failures surface instead
// of being guessed around.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::quote_engine::collaborators::{BookingIndex, ExcursionCatalog};
use crate::quote_engine::error::{QEResult, QuoteEngineError};
use crate::quote_engine::types::StockStatus;

/// Default low-stock boundary (remaining slots after the requested booking)
const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 3;

/// Remaining-capacity answer for one (excursion, date, participants) query
///
/// `capacity_managed == false` marks the uncapped sentinel: `available_slots`
/// is 0 and means "no cap", not "full". Callers must check the flag before
/// interpreting the slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityResult {
    pub available: bool,
    pub stock_status: StockStatus,
    pub available_slots: i64,
    pub capacity_managed: bool,
}

/// Request-scoped memoization of capacity answers
///
/// Multiple widgets on one page render ask the same question; the memo
/// deduplicates those lookups for the lifetime of a single request. It is
/// not the durable cache and carries no TTL; create one per request and
/// drop it with the request.
#[derive(Debug, Default)]
pub struct CapacityMemo {
    entries: HashMap<(i32, NaiveDate, u32), CapacityResult>,
}

impl CapacityMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Remaining-slot computation over the catalog and booking index
pub struct CapacityAggregator {
    catalog: Arc<dyn ExcursionCatalog>,
    booking_index: Arc<dyn BookingIndex>,
    low_stock_threshold: i64,
}

impl CapacityAggregator {
    pub fn new(catalog: Arc<dyn ExcursionCatalog>, booking_index: Arc<dyn BookingIndex>) -> Self {
        Self {
            catalog,
            booking_index,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }

    /// Compute remaining capacity and stock status
    ///
    /// Steps:
    /// 1. Uncapped or stock-display-disabled products short-circuit to the
    ///    sentinel result.
    /// 2. Booked participants come from the rollup when present, otherwise
    ///    from summing itemized records. The two sources never both
    ///    contribute to one sum.
    /// 3. Remaining slots and the threshold classification follow.
    pub async fn capacity(
        &self,
        memo: &mut CapacityMemo,
        excursion_id: i32,
        date: NaiveDate,
        requested_participants: u32,
    ) -> QEResult<CapacityResult> {
        let memo_key = (excursion_id, date, requested_participants);
        if let Some(result) = memo.entries.get(&memo_key) {
            return Ok(*result);
        }

        let info = match self.catalog.excursion(excursion_id).await {
            Ok(info) => info,
            Err(QuoteEngineError::ExcursionNotFound(id)) => {
                return Err(QuoteEngineError::ExcursionNotFound(id));
            }
            Err(e) => {
                return Err(QuoteEngineError::UpstreamUnavailable(format!(
                    "excursion {} attributes unavailable: {}",
                    excursion_id, e
                )));
            }
        };

        let result = match info.max_capacity {
            Some(max_capacity) if info.display_stock => {
                let total_booked = self.total_booked(excursion_id, date).await?;
                let available_slots = (i64::from(max_capacity) - total_booked).max(0);
                let available = available_slots >= i64::from(requested_participants);

                let stock_status = if available {
                    let remaining_after_booking =
                        available_slots - i64::from(requested_participants);
                    self.classify(remaining_after_booking, i64::from(info.stock_threshold))
                } else {
                    StockStatus::Limited
                };

                CapacityResult {
                    available,
                    stock_status,
                    available_slots,
                    capacity_managed: true,
                }
            }
            // No configured cap, or stock display disabled: always bookable
            _ => CapacityResult {
                available: true,
                stock_status: StockStatus::Available,
                available_slots: 0,
                capacity_managed: false,
            },
        };

        memo.entries.insert(memo_key, result);
        Ok(result)
    }

    /// Booked participant count for the excursion/date
    ///
    /// The rollup, when the index maintains one, is the single source for
    /// this (excursion, date); itemized records are summed only when no
    /// rollup exists. This keeps aggregate and itemized representations
    /// from double counting.
    async fn total_booked(&self, excursion_id: i32, date: NaiveDate) -> QEResult<i64> {
        let rollup = self
            .booking_index
            .booked_rollup(excursion_id, date)
            .await
            .map_err(|e| {
                QuoteEngineError::UpstreamUnavailable(format!("booking index unavailable: {}", e))
            })?;

        if let Some(total) = rollup {
            return Ok(total);
        }

        let records = self
            .booking_index
            .booking_records(excursion_id, date)
            .await
            .map_err(|e| {
                QuoteEngineError::UpstreamUnavailable(format!("booking index unavailable: {}", e))
            })?;

        Ok(records.iter().map(|r| i64::from(r.participant_count)).sum())
    }

    fn classify(&self, remaining_after_booking: i64, stock_threshold: i64) -> StockStatus {
        if remaining_after_booking <= self.low_stock_threshold {
            StockStatus::Limited
        } else if remaining_after_booking <= stock_threshold {
            StockStatus::Medium
        } else {
            StockStatus::Available
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote_engine::collaborators::{BookingRecord, ExcursionInfo};
    use axum::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};
    use uuid::Uuid;

    struct FakeCatalog {
        max_capacity: Option<i32>,
        display_stock: bool,
        stock_threshold: i32,
    }

    #[async_trait]
    impl ExcursionCatalog for FakeCatalog {
        async fn excursion(&self, excursion_id: i32) -> QEResult<ExcursionInfo> {
            Ok(ExcursionInfo {
                id: excursion_id,
                base_price: dec!(50000),
                max_capacity: self.max_capacity,
                display_stock: self.display_stock,
                stock_threshold: self.stock_threshold,
                is_peak_season: false,
            })
        }
    }

    struct FakeIndex {
        rollup: Option<i64>,
        records: Vec<i32>,
        lookups: AtomicU64,
    }

    impl FakeIndex {
        fn new(rollup: Option<i64>, records: Vec<i32>) -> Self {
            Self {
                rollup,
                records,
                lookups: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl BookingIndex for FakeIndex {
        async fn booked_rollup(&self, _excursion_id: i32, _date: NaiveDate) -> QEResult<Option<i64>> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            Ok(self.rollup)
        }

        async fn booking_records(
            &self,
            _excursion_id: i32,
            _date: NaiveDate,
        ) -> QEResult<Vec<BookingRecord>> {
            Ok(self
                .records
                .iter()
                .map(|&participant_count| BookingRecord {
                    id: Uuid::new_v4(),
                    participant_count,
                })
                .collect())
        }
    }

    struct DownIndex;

    #[async_trait]
    impl BookingIndex for DownIndex {
        async fn booked_rollup(&self, _excursion_id: i32, _date: NaiveDate) -> QEResult<Option<i64>> {
            Err(QuoteEngineError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn booking_records(
            &self,
            _excursion_id: i32,
            _date: NaiveDate,
        ) -> QEResult<Vec<BookingRecord>> {
            Err(QuoteEngineError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn capped_catalog(max: i32) -> Arc<FakeCatalog> {
        Arc::new(FakeCatalog {
            max_capacity: Some(max),
            display_stock: true,
            stock_threshold: 5,
        })
    }

    fn june_5() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 5).unwrap()
    }

    #[tokio::test]
    async fn test_stock_threshold_boundary_is_inclusive() {
        // max 10, booked 5, requested 2, low threshold 3:
        // slots 5, remaining after booking 3 -> limited
        let aggregator = CapacityAggregator::new(
            capped_catalog(10),
            Arc::new(FakeIndex::new(Some(5), vec![])),
        );
        let mut memo = CapacityMemo::new();

        let result = aggregator.capacity(&mut memo, 1, june_5(), 2).await.unwrap();

        assert!(result.available);
        assert_eq!(result.available_slots, 5);
        assert_eq!(result.stock_status, StockStatus::Limited);
        assert!(result.capacity_managed);
    }

    #[tokio::test]
    async fn test_medium_and_available_tiers() {
        // slots 8, requested 2 -> remaining 6 > threshold 5 -> available
        let aggregator = CapacityAggregator::new(
            capped_catalog(10),
            Arc::new(FakeIndex::new(Some(2), vec![])),
        );
        let mut memo = CapacityMemo::new();
        let result = aggregator.capacity(&mut memo, 1, june_5(), 2).await.unwrap();
        assert_eq!(result.stock_status, StockStatus::Available);

        // slots 7, requested 2 -> remaining 5 == threshold -> medium
        let aggregator = CapacityAggregator::new(
            capped_catalog(10),
            Arc::new(FakeIndex::new(Some(3), vec![])),
        );
        let mut memo = CapacityMemo::new();
        let result = aggregator.capacity(&mut memo, 1, june_5(), 2).await.unwrap();
        assert_eq!(result.stock_status, StockStatus::Medium);
    }

    #[tokio::test]
    async fn test_overbooking_rejected() {
        // max 10, booked 9, requested 2 -> 1 slot, unavailable
        let aggregator = CapacityAggregator::new(
            capped_catalog(10),
            Arc::new(FakeIndex::new(Some(9), vec![])),
        );
        let mut memo = CapacityMemo::new();

        let result = aggregator.capacity(&mut memo, 1, june_5(), 2).await.unwrap();

        assert!(!result.available);
        assert_eq!(result.available_slots, 1);
        assert_eq!(result.stock_status, StockStatus::Limited);
    }

    #[tokio::test]
    async fn test_uncapped_product_is_always_available() {
        let aggregator = CapacityAggregator::new(
            Arc::new(FakeCatalog {
                max_capacity: None,
                display_stock: true,
                stock_threshold: 5,
            }),
            Arc::new(FakeIndex::new(Some(5000), vec![])),
        );
        let mut memo = CapacityMemo::new();

        let result = aggregator
            .capacity(&mut memo, 1, june_5(), 40)
            .await
            .unwrap();

        assert!(result.available);
        assert_eq!(result.stock_status, StockStatus::Available);
        assert_eq!(result.available_slots, 0);
        assert!(!result.capacity_managed);
    }

    #[tokio::test]
    async fn test_stock_display_disabled_short_circuits() {
        let index = Arc::new(FakeIndex::new(Some(9), vec![]));
        let aggregator = CapacityAggregator::new(
            Arc::new(FakeCatalog {
                max_capacity: Some(10),
                display_stock: false,
                stock_threshold: 5,
            }),
            index.clone(),
        );
        let mut memo = CapacityMemo::new();

        let result = aggregator.capacity(&mut memo, 1, june_5(), 2).await.unwrap();

        assert!(result.available);
        assert!(!result.capacity_managed);
        // The booking index was never consulted
        assert_eq!(index.lookups.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_rollup_excludes_itemized_records() {
        // Rollup says 5 while itemized rows also exist; only the rollup may
        // contribute, so slots are 10 - 5, not 10 - 12.
        let aggregator = CapacityAggregator::new(
            capped_catalog(10),
            Arc::new(FakeIndex::new(Some(5), vec![3, 4])),
        );
        let mut memo = CapacityMemo::new();

        let result = aggregator.capacity(&mut memo, 1, june_5(), 1).await.unwrap();

        assert_eq!(result.available_slots, 5);
    }

    #[tokio::test]
    async fn test_itemized_fallback_sums_records() {
        let aggregator = CapacityAggregator::new(
            capped_catalog(10),
            Arc::new(FakeIndex::new(None, vec![3, 4])),
        );
        let mut memo = CapacityMemo::new();

        let result = aggregator.capacity(&mut memo, 1, june_5(), 1).await.unwrap();

        assert_eq!(result.available_slots, 3);
    }

    #[tokio::test]
    async fn test_memo_deduplicates_within_request() {
        let index = Arc::new(FakeIndex::new(Some(4), vec![]));
        let aggregator = CapacityAggregator::new(capped_catalog(10), index.clone());
        let mut memo = CapacityMemo::new();

        let first = aggregator.capacity(&mut memo, 1, june_5(), 2).await.unwrap();
        let second = aggregator.capacity(&mut memo, 1, june_5(), 2).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(index.lookups.load(Ordering::Relaxed), 1);
        assert_eq!(memo.len(), 1);

        // A different participant count is a different question
        aggregator.capacity(&mut memo, 1, june_5(), 5).await.unwrap();
        assert_eq!(index.lookups.load(Ordering::Relaxed), 2);
        assert_eq!(memo.len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces_instead_of_guessing() {
        let aggregator = CapacityAggregator::new(capped_catalog(10), Arc::new(DownIndex));
        let mut memo = CapacityMemo::new();

        let err = aggregator
            .capacity(&mut memo, 1, june_5(), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteEngineError::UpstreamUnavailable(_)));
        assert!(memo.is_empty());
    }
}
