// Validation utilities module
// Provides custom validation functions for domain-specific rules

use chrono::{Duration, NaiveDate, Utc};
use validator::ValidationError;

/// How far into the future a quote may be requested (2 years)
const MAX_BOOKING_HORIZON_DAYS: i64 = 730;

/// Validates that a start date lies within the bookable horizon
pub fn validate_booking_window(start_date: &NaiveDate) -> Result<(), ValidationError> {
    let horizon = Utc::now().date_naive() + Duration::days(MAX_BOOKING_HORIZON_DAYS);
    if *start_date > horizon {
        Err(ValidationError::new("start_date_beyond_booking_horizon"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_future_date_is_valid() {
        let date = Utc::now().date_naive() + Duration::days(30);
        assert!(validate_booking_window(&date).is_ok());
    }

    #[test]
    fn test_date_beyond_horizon_is_rejected() {
        let date = Utc::now().date_naive() + Duration::days(MAX_BOOKING_HORIZON_DAYS + 1);
        assert!(validate_booking_window(&date).is_err());
    }
}
