// Domain type definitions for the Quote Engine
// Provides shared types used across the dispatcher, cache, and capacity logic

use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-reported network quality
///
/// Supplied with each request and used to steer the fallback chain and the
/// cache duration policy. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkQuality {
    /// Healthy connection, freshness preferred over staleness
    Normal,

    /// Degraded but usable connection
    Slow,

    /// Barely usable connection, heuristic answers acceptable
    VerySlow,

    /// Client is working from an offline queue
    Offline,
}

impl NetworkQuality {
    /// Whether this quality level should avoid the authoritative computation
    pub fn prefers_approximation(self) -> bool {
        matches!(self, NetworkQuality::VerySlow | NetworkQuality::Offline)
    }
}

impl Default for NetworkQuality {
    fn default() -> Self {
        NetworkQuality::Normal
    }
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkQuality::Normal => write!(f, "normal"),
            NetworkQuality::Slow => write!(f, "slow"),
            NetworkQuality::VerySlow => write!(f, "very_slow"),
            NetworkQuality::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for NetworkQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(NetworkQuality::Normal),
            "slow" => Ok(NetworkQuality::Slow),
            "very_slow" => Ok(NetworkQuality::VerySlow),
            "offline" => Ok(NetworkQuality::Offline),
            _ => Err(format!("Invalid network quality: {}", s)),
        }
    }
}

/// Request-scoped network context
///
/// Carries the client-reported quality for the current request only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NetworkContext {
    #[serde(default)]
    pub quality: NetworkQuality,
}

impl NetworkContext {
    pub fn new(quality: NetworkQuality) -> Self {
        Self { quality }
    }
}

/// Tiered classification of remaining booking capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// Plenty of slots left after the requested booking
    Available,

    /// Remaining slots at or below the product stock threshold
    Medium,

    /// Remaining slots at or below the low-stock threshold
    Limited,
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockStatus::Available => write!(f, "available"),
            StockStatus::Medium => write!(f, "medium"),
            StockStatus::Limited => write!(f, "limited"),
        }
    }
}

/// Why a pricing result is an approximation rather than authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproximationReason {
    /// Result came from the authoritative computation or its cache
    None,

    /// Client reported it is offline
    Offline,

    /// Client reported a very slow connection
    VerySlow,
}

impl fmt::Display for ApproximationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApproximationReason::None => write!(f, "none"),
            ApproximationReason::Offline => write!(f, "offline"),
            ApproximationReason::VerySlow => write!(f, "very_slow"),
        }
    }
}

impl From<NetworkQuality> for ApproximationReason {
    fn from(quality: NetworkQuality) -> Self {
        match quality {
            NetworkQuality::Offline => ApproximationReason::Offline,
            NetworkQuality::VerySlow => ApproximationReason::VerySlow,
            NetworkQuality::Normal | NetworkQuality::Slow => ApproximationReason::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_network_quality_display() {
        assert_eq!(NetworkQuality::Normal.to_string(), "normal");
        assert_eq!(NetworkQuality::Slow.to_string(), "slow");
        assert_eq!(NetworkQuality::VerySlow.to_string(), "very_slow");
        assert_eq!(NetworkQuality::Offline.to_string(), "offline");
    }

    #[test]
    fn test_network_quality_from_str() {
        assert_eq!(
            NetworkQuality::from_str("very_slow").unwrap(),
            NetworkQuality::VerySlow
        );
        assert!(NetworkQuality::from_str("fast").is_err());
    }

    #[test]
    fn test_network_quality_default() {
        assert_eq!(NetworkQuality::default(), NetworkQuality::Normal);
        assert_eq!(NetworkContext::default().quality, NetworkQuality::Normal);
    }

    #[test]
    fn test_prefers_approximation() {
        assert!(!NetworkQuality::Normal.prefers_approximation());
        assert!(!NetworkQuality::Slow.prefers_approximation());
        assert!(NetworkQuality::VerySlow.prefers_approximation());
        assert!(NetworkQuality::Offline.prefers_approximation());
    }

    #[test]
    fn test_stock_status_display() {
        assert_eq!(StockStatus::Available.to_string(), "available");
        assert_eq!(StockStatus::Medium.to_string(), "medium");
        assert_eq!(StockStatus::Limited.to_string(), "limited");
    }

    #[test]
    fn test_approximation_reason_from_quality() {
        assert_eq!(
            ApproximationReason::from(NetworkQuality::Offline),
            ApproximationReason::Offline
        );
        assert_eq!(
            ApproximationReason::from(NetworkQuality::VerySlow),
            ApproximationReason::VerySlow
        );
        assert_eq!(
            ApproximationReason::from(NetworkQuality::Normal),
            ApproximationReason::None
        );
    }

    #[test]
    fn test_serialization() {
        let quality = NetworkQuality::VerySlow;
        let json = serde_json::to_string(&quality).unwrap();
        assert_eq!(json, "\"very_slow\"");

        let status: StockStatus = serde_json::from_str("\"limited\"").unwrap();
        assert_eq!(status, StockStatus::Limited);

        let reason: ApproximationReason = serde_json::from_str("\"offline\"").unwrap();
        assert_eq!(reason, ApproximationReason::Offline);
    }
}
