// External collaborator interfaces
//
// The engine consumes the authoritative pricing formula, the product
// catalog, the booking index, and the popularity ranking through these
// traits. Production implementations are Postgres-backed; tests inject
// doubles through the same seams.

use axum::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::quote_engine::error::{QEResult, QuoteEngineError};
use crate::quote_engine::fingerprint::{LineSelection, QuoteRequest};
use crate::quote_engine::types::ApproximationReason;

/// Pricing- and capacity-relevant excursion attributes
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExcursionInfo {
    pub id: i32,
    pub base_price: Decimal,
    pub max_capacity: Option<i32>,
    pub display_stock: bool,
    pub stock_threshold: i32,
    pub is_peak_season: bool,
}

/// One priced extra or activity line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub id: i32,
    pub qty: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// A priced booking scenario
///
/// Carries the approximation flag so downstream UI can warn that the number
/// may change at checkout. Approximate results feed display paths only; the
/// authoritative computation re-validates every paid transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub price_per_person: Decimal,
    pub base_price: Decimal,
    pub extras_breakdown: Vec<PriceLine>,
    pub activities_breakdown: Vec<PriceLine>,
    pub vehicle_price: Decimal,
    pub total_price: Decimal,
    pub participant_count: u32,
    pub day_count: u32,
    pub is_approximation: bool,
    pub approximation_reason: ApproximationReason,
    pub computed_at: DateTime<Utc>,
}

impl PricingResult {
    /// Equality ignoring the computation timestamp
    ///
    /// Cached and freshly computed results for one scenario compare equal
    /// even though they were produced at different times.
    pub fn same_quote(&self, other: &PricingResult) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.computed_at = b.computed_at;
        a == b
    }
}

/// One itemized booking row from the fallback enumerator
#[derive(Debug, Clone, FromRow)]
pub struct BookingRecord {
    pub id: Uuid,
    pub participant_count: i32,
}

/// The real pricing formula, consumed as a black box
#[async_trait]
pub trait AuthoritativePricer: Send + Sync {
    async fn compute(&self, request: &QuoteRequest) -> QEResult<PricingResult>;
}

/// Product attribute lookup
#[async_trait]
pub trait ExcursionCatalog: Send + Sync {
    async fn excursion(&self, excursion_id: i32) -> QEResult<ExcursionInfo>;
}

/// Read-only view of booked participant counts
///
/// The rollup is the preferred O(1) source; the itemized enumeration is the
/// fallback. The capacity aggregator guarantees the two never both
/// contribute to one (excursion, date) sum.
#[async_trait]
pub trait BookingIndex: Send + Sync {
    /// Pre-aggregated participant count, when the index maintains one
    async fn booked_rollup(&self, excursion_id: i32, date: NaiveDate) -> QEResult<Option<i64>>;

    /// Individual booking rows for the date
    async fn booking_records(
        &self,
        excursion_id: i32,
        date: NaiveDate,
    ) -> QEResult<Vec<BookingRecord>>;
}

/// Ranking source for the precomputation scheduler
#[async_trait]
pub trait PopularitySource: Send + Sync {
    async fn popular_excursions(&self, limit: i64) -> QEResult<Vec<i32>>;
}

// ---------------------------------------------------------------------------
// Postgres implementations
// ---------------------------------------------------------------------------

/// Catalog backed by the excursions table
pub struct PgExcursionCatalog {
    pool: PgPool,
}

impl PgExcursionCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExcursionCatalog for PgExcursionCatalog {
    async fn excursion(&self, excursion_id: i32) -> QEResult<ExcursionInfo> {
        let info = sqlx::query_as::<_, ExcursionInfo>(
            r#"
            SELECT id, base_price, max_capacity, display_stock, stock_threshold, is_peak_season
            FROM excursions
            WHERE id = $1
            "#,
        )
        .bind(excursion_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(QuoteEngineError::ExcursionNotFound(excursion_id))?;

        Ok(info)
    }
}

/// Reference implementation of the authoritative pricing formula
///
/// Tiered per-person day rates, extras and activities priced from their own
/// tables, and a per-day vehicle charge. The engine treats the output as
/// opaque; only the shape of PricingResult matters to callers.
pub struct PgAuthoritativePricer {
    pool: PgPool,
}

impl PgAuthoritativePricer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn tier_rate(&self, excursion_id: i32, participants: u32) -> QEResult<Option<Decimal>> {
        let rate: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT price_per_person
            FROM excursion_price_tiers
            WHERE excursion_id = $1 AND min_participants <= $2
            ORDER BY min_participants DESC
            LIMIT 1
            "#,
        )
        .bind(excursion_id)
        .bind(participants as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rate)
    }

    async fn price_lines(
        &self,
        table: &str,
        excursion_id: i32,
        selections: &[LineSelection],
    ) -> QEResult<Vec<PriceLine>> {
        let mut lines = Vec::with_capacity(selections.len());
        for selection in selections {
            if selection.qty == 0 {
                continue;
            }
            let query = format!(
                "SELECT price FROM {} WHERE excursion_id = $1 AND id = $2",
                table
            );
            let unit_price: Option<Decimal> = sqlx::query_scalar(&query)
                .bind(excursion_id)
                .bind(selection.id)
                .fetch_optional(&self.pool)
                .await?;

            if let Some(unit_price) = unit_price {
                lines.push(PriceLine {
                    id: selection.id,
                    qty: selection.qty,
                    unit_price,
                    total: unit_price * Decimal::from(selection.qty),
                });
            } else {
                tracing::debug!(
                    "Skipping unknown {} id {} for excursion {}",
                    table,
                    selection.id,
                    excursion_id
                );
            }
        }
        Ok(lines)
    }
}

#[async_trait]
impl AuthoritativePricer for PgAuthoritativePricer {
    async fn compute(&self, request: &QuoteRequest) -> QEResult<PricingResult> {
        let base_price: Decimal = sqlx::query_scalar(
            "SELECT base_price FROM excursions WHERE id = $1",
        )
        .bind(request.excursion_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(QuoteEngineError::ExcursionNotFound(request.excursion_id))?;

        let vehicle_day_rate: Decimal = sqlx::query_scalar(
            "SELECT vehicle_price FROM excursions WHERE id = $1",
        )
        .bind(request.excursion_id)
        .fetch_one(&self.pool)
        .await?;

        let day_count = request.day_count();
        let day_rate = self
            .tier_rate(request.excursion_id, request.participant_count)
            .await?
            .unwrap_or(base_price);

        let price_per_person = day_rate * Decimal::from(day_count);
        let extras_breakdown = self
            .price_lines("excursion_extras", request.excursion_id, &request.extras)
            .await?;
        let activities_breakdown = self
            .price_lines(
                "excursion_activities",
                request.excursion_id,
                &request.activities,
            )
            .await?;

        let extras_total: Decimal = extras_breakdown.iter().map(|l| l.total).sum();
        let activities_total: Decimal = activities_breakdown.iter().map(|l| l.total).sum();
        let vehicle_price = vehicle_day_rate * Decimal::from(day_count);

        let total_price = price_per_person * Decimal::from(request.participant_count)
            + extras_total
            + activities_total
            + vehicle_price;

        Ok(PricingResult {
            price_per_person,
            base_price,
            extras_breakdown,
            activities_breakdown,
            vehicle_price,
            total_price,
            participant_count: request.participant_count,
            day_count,
            is_approximation: false,
            approximation_reason: ApproximationReason::None,
            computed_at: Utc::now(),
        })
    }
}

/// Booking index backed by the rollup table with itemized fallback
pub struct PgBookingIndex {
    pool: PgPool,
}

impl PgBookingIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingIndex for PgBookingIndex {
    async fn booked_rollup(&self, excursion_id: i32, date: NaiveDate) -> QEResult<Option<i64>> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT total_participants
            FROM booking_rollups
            WHERE excursion_id = $1 AND excursion_date = $2
            "#,
        )
        .bind(excursion_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(total)
    }

    async fn booking_records(
        &self,
        excursion_id: i32,
        date: NaiveDate,
    ) -> QEResult<Vec<BookingRecord>> {
        let records = sqlx::query_as::<_, BookingRecord>(
            r#"
            SELECT id, participant_count
            FROM bookings
            WHERE excursion_id = $1
              AND excursion_date = $2
              AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(excursion_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

/// Popularity ranking from recent booking volume
///
/// Falls back to the most recently published excursions when no volume data
/// exists yet (fresh installs, new seasons).
pub struct PgPopularitySource {
    pool: PgPool,
}

impl PgPopularitySource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PopularitySource for PgPopularitySource {
    async fn popular_excursions(&self, limit: i64) -> QEResult<Vec<i32>> {
        let by_volume: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT excursion_id
            FROM bookings
            WHERE created_at > NOW() - INTERVAL '90 days'
            GROUP BY excursion_id
            ORDER BY SUM(participant_count) DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if !by_volume.is_empty() {
            return Ok(by_volume);
        }

        tracing::debug!("No recent booking volume, ranking by publish date");
        let by_publish_date: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM excursions
            WHERE published
            ORDER BY published_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(by_publish_date)
    }
}
