// Approximation Engine
//
// Degraded-mode price estimator. Uses only the product's base price plus
// season and group-size heuristics, so it stays answerable when the
// authoritative computation is unreachable or undesirable. Every result is
// tagged as an approximation; checkout always re-validates against the
// authoritative formula.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::quote_engine::collaborators::{ExcursionCatalog, PricingResult};
use crate::quote_engine::error::{QEResult, QuoteEngineError};
use crate::quote_engine::types::ApproximationReason;

/// Months treated as high season (Dec, Jan, Feb, Jul, Aug)
const HIGH_SEASON_MONTHS: [u32; 5] = [12, 1, 2, 7, 8];

/// Group-size tiers for the discount heuristic
const LARGE_GROUP_SIZE: u32 = 10;
const MEDIUM_GROUP_SIZE: u32 = 5;

/// Heuristic price estimator for degraded connectivity
pub struct ApproximationEngine {
    catalog: Arc<dyn ExcursionCatalog>,
}

impl ApproximationEngine {
    pub fn new(catalog: Arc<dyn ExcursionCatalog>) -> Self {
        Self { catalog }
    }

    /// Estimate a price from the base price and heuristics only
    ///
    /// Extras and activities are omitted: the approximation is price-only
    /// and their breakdowns stay empty. `reason` records why the caller
    /// chose the degraded path.
    pub async fn approximate(
        &self,
        excursion_id: i32,
        participant_count: u32,
        start_date: NaiveDate,
        reason: ApproximationReason,
    ) -> QEResult<PricingResult> {
        let info = match self.catalog.excursion(excursion_id).await {
            Ok(info) => info,
            Err(QuoteEngineError::ExcursionNotFound(id)) => {
                return Err(QuoteEngineError::ExcursionNotFound(id));
            }
            Err(e) => {
                return Err(QuoteEngineError::ApproximationUnavailable(format!(
                    "base price for excursion {} could not be resolved: {}",
                    excursion_id, e
                )));
            }
        };

        let price_per_person = info.base_price
            * season_multiplier(start_date)
            * group_discount(participant_count);
        let total_price = price_per_person * Decimal::from(participant_count);

        tracing::debug!(
            "Approximated excursion {} for {} participants on {}: {} per person",
            excursion_id,
            participant_count,
            start_date,
            price_per_person
        );

        Ok(PricingResult {
            price_per_person,
            base_price: info.base_price,
            extras_breakdown: Vec::new(),
            activities_breakdown: Vec::new(),
            vehicle_price: Decimal::ZERO,
            total_price,
            participant_count,
            day_count: 1,
            is_approximation: true,
            approximation_reason: reason,
            computed_at: Utc::now(),
        })
    }
}

/// High-season months carry a 1.2x surcharge
fn season_multiplier(date: NaiveDate) -> Decimal {
    if HIGH_SEASON_MONTHS.contains(&date.month()) {
        Decimal::new(12, 1)
    } else {
        Decimal::ONE
    }
}

/// Larger groups get a flat discount tier
fn group_discount(participant_count: u32) -> Decimal {
    if participant_count >= LARGE_GROUP_SIZE {
        Decimal::new(9, 1)
    } else if participant_count >= MEDIUM_GROUP_SIZE {
        Decimal::new(95, 2)
    } else {
        Decimal::ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote_engine::collaborators::ExcursionInfo;
    use axum::async_trait;
    use rust_decimal_macros::dec;

    struct FixedCatalog {
        base_price: Decimal,
    }

    #[async_trait]
    impl ExcursionCatalog for FixedCatalog {
        async fn excursion(&self, excursion_id: i32) -> QEResult<ExcursionInfo> {
            Ok(ExcursionInfo {
                id: excursion_id,
                base_price: self.base_price,
                max_capacity: Some(20),
                display_stock: true,
                stock_threshold: 5,
                is_peak_season: false,
            })
        }
    }

    struct MissingCatalog;

    #[async_trait]
    impl ExcursionCatalog for MissingCatalog {
        async fn excursion(&self, excursion_id: i32) -> QEResult<ExcursionInfo> {
            Err(QuoteEngineError::ExcursionNotFound(excursion_id))
        }
    }

    struct BrokenCatalog;

    #[async_trait]
    impl ExcursionCatalog for BrokenCatalog {
        async fn excursion(&self, _excursion_id: i32) -> QEResult<ExcursionInfo> {
            Err(QuoteEngineError::UpstreamUnavailable("catalog down".to_string()))
        }
    }

    fn july() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 20).unwrap()
    }

    #[tokio::test]
    async fn test_high_season_group_of_six() {
        let engine = ApproximationEngine::new(Arc::new(FixedCatalog {
            base_price: dec!(50000),
        }));

        let result = engine
            .approximate(1, 6, july(), ApproximationReason::Offline)
            .await
            .unwrap();

        // 50000 * 1.2 * 0.95
        assert_eq!(result.price_per_person, dec!(57000.0));
        assert_eq!(result.total_price, dec!(342000.0));
        assert!(result.is_approximation);
        assert_eq!(result.approximation_reason, ApproximationReason::Offline);
        assert!(result.extras_breakdown.is_empty());
        assert!(result.activities_breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_low_season_small_group_is_base_price() {
        let engine = ApproximationEngine::new(Arc::new(FixedCatalog {
            base_price: dec!(50000),
        }));

        let result = engine
            .approximate(
                1,
                2,
                NaiveDate::from_ymd_opt(2026, 4, 10).unwrap(),
                ApproximationReason::VerySlow,
            )
            .await
            .unwrap();

        assert_eq!(result.price_per_person, dec!(50000));
        assert_eq!(result.total_price, dec!(100000));
        assert_eq!(result.approximation_reason, ApproximationReason::VerySlow);
    }

    #[tokio::test]
    async fn test_large_group_discount_tier() {
        let engine = ApproximationEngine::new(Arc::new(FixedCatalog {
            base_price: dec!(10000),
        }));

        let result = engine
            .approximate(
                1,
                10,
                NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                ApproximationReason::Offline,
            )
            .await
            .unwrap();

        // 10000 * 0.9 * 10
        assert_eq!(result.price_per_person, dec!(9000.0));
        assert_eq!(result.total_price, dec!(90000.0));
    }

    #[test]
    fn test_season_multiplier_months() {
        for month in [12u32, 1, 2, 7, 8] {
            let date = NaiveDate::from_ymd_opt(2026, month, 15).unwrap();
            assert_eq!(season_multiplier(date), dec!(1.2), "month {}", month);
        }
        for month in [3u32, 4, 5, 6, 9, 10, 11] {
            let date = NaiveDate::from_ymd_opt(2026, month, 15).unwrap();
            assert_eq!(season_multiplier(date), Decimal::ONE, "month {}", month);
        }
    }

    #[test]
    fn test_group_discount_boundaries() {
        assert_eq!(group_discount(4), Decimal::ONE);
        assert_eq!(group_discount(5), dec!(0.95));
        assert_eq!(group_discount(9), dec!(0.95));
        assert_eq!(group_discount(10), dec!(0.9));
        assert_eq!(group_discount(25), dec!(0.9));
    }

    #[tokio::test]
    async fn test_unknown_excursion_surfaces_as_not_found() {
        let engine = ApproximationEngine::new(Arc::new(MissingCatalog));

        let err = engine
            .approximate(99, 2, july(), ApproximationReason::Offline)
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteEngineError::ExcursionNotFound(99)));
    }

    #[tokio::test]
    async fn test_catalog_failure_becomes_unavailable() {
        let engine = ApproximationEngine::new(Arc::new(BrokenCatalog));

        let err = engine
            .approximate(1, 2, july(), ApproximationReason::Offline)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QuoteEngineError::ApproximationUnavailable(_)
        ));
    }
}
