use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Represents an excursion product in the database
///
/// Carries the attributes the quote engine needs: the base price feeds the
/// approximation heuristics, the capacity fields feed the availability
/// checks, and the peak-season flag feeds the cache duration policy.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Excursion {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Waza National Park Safari")]
    pub name: String,
    #[schema(example = "Two-day guided safari with park entry included")]
    pub description: String,
    /// Base price per person in XAF
    #[schema(example = 50000)]
    pub base_price: Decimal,
    /// Vehicle hire per day in XAF
    #[schema(example = 15000)]
    pub vehicle_price: Decimal,
    /// Maximum participants per date; null means uncapped
    #[schema(example = 20)]
    pub max_capacity: Option<i32>,
    #[schema(example = true)]
    pub display_stock: bool,
    #[schema(example = 5)]
    pub stock_threshold: i32,
    #[schema(example = false)]
    pub is_peak_season: bool,
    #[schema(example = true)]
    pub published: bool,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
