// Cache Duration Policy
//
// Selects how long a freshly computed quote may be served from cache.
// Worse connectivity tolerates, and in fact requires, staler data in exchange
// for availability; better connectivity favors freshness.

use chrono::{Datelike, NaiveDateTime, Timelike};
use std::time::Duration;

use crate::quote_engine::types::NetworkQuality;

/// Base TTL for clients on a normal connection (5 minutes)
const BASE_TTL_NORMAL: Duration = Duration::from_secs(5 * 60);
/// Base TTL for slow clients (30 minutes)
const BASE_TTL_SLOW: Duration = Duration::from_secs(30 * 60);
/// Base TTL for very slow clients (1 hour)
const BASE_TTL_VERY_SLOW: Duration = Duration::from_secs(60 * 60);
/// Base TTL for offline clients (6 hours)
const BASE_TTL_OFFLINE: Duration = Duration::from_secs(6 * 60 * 60);

/// Local peak business hours, inclusive start / exclusive end
const PEAK_HOURS: (u32, u32) = (9, 18);

/// Adaptive TTL selector
///
/// Applies the base table for the reported network quality, then the
/// weekend, time-of-day, and peak-season adjustments multiplicatively in
/// that order. Every adjustment can be overridden independently.
#[derive(Debug, Clone)]
pub struct CacheDurationPolicy {
    pub weekend_multiplier: f64,
    pub peak_hours_multiplier: f64,
    pub off_peak_multiplier: f64,
    pub peak_season_multiplier: f64,
}

impl Default for CacheDurationPolicy {
    fn default() -> Self {
        Self {
            weekend_multiplier: 1.5,
            peak_hours_multiplier: 0.8,
            off_peak_multiplier: 1.3,
            peak_season_multiplier: 0.7,
        }
    }
}

impl CacheDurationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the TTL for a cache write
    ///
    /// `now` is local wall-clock time; `is_peak_season` is the product-level
    /// flag resolved by the caller. The result is floored to whole seconds
    /// and never below 1 second.
    pub fn duration(
        &self,
        quality: NetworkQuality,
        is_peak_season: bool,
        now: NaiveDateTime,
    ) -> Duration {
        let base = match quality {
            NetworkQuality::Normal => BASE_TTL_NORMAL,
            NetworkQuality::Slow => BASE_TTL_SLOW,
            NetworkQuality::VerySlow => BASE_TTL_VERY_SLOW,
            NetworkQuality::Offline => BASE_TTL_OFFLINE,
        };

        let mut seconds = base.as_secs() as f64;

        // Weekend demand planning is more stable
        if is_weekend(now) {
            seconds *= self.weekend_multiplier;
        }

        // Staff and customers actively interact during peak hours, so serve
        // fresher data then and stretch entries overnight
        if is_peak_hour(now) {
            seconds *= self.peak_hours_multiplier;
        } else {
            seconds *= self.off_peak_multiplier;
        }

        // Peak-season prices get adjusted more often
        if is_peak_season {
            seconds *= self.peak_season_multiplier;
        }

        Duration::from_secs((seconds.floor() as u64).max(1))
    }
}

fn is_weekend(now: NaiveDateTime) -> bool {
    matches!(now.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn is_peak_hour(now: NaiveDateTime) -> bool {
    let hour = now.hour();
    hour >= PEAK_HOURS.0 && hour < PEAK_HOURS.1
}
