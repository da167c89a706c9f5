// Scenario Fingerprint
//
// Maps a quote request to a canonical cache key. Extras and activities are
// order-independent: requests that differ only in selection order hash to the
// same scenario. No side effects, no state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::quote_engine::error::{QEResult, QuoteEngineError};

/// One selected extra or activity line in a quote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSelection {
    pub id: i32,
    pub qty: u32,
}

/// A booking scenario to be priced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub excursion_id: i32,
    pub participant_count: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub extras: Vec<LineSelection>,
    #[serde(default)]
    pub activities: Vec<LineSelection>,
}

impl QuoteRequest {
    /// End date with the single-day default applied
    pub fn effective_end_date(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.start_date)
    }

    /// Inclusive day span of the excursion, never below 1
    pub fn day_count(&self) -> u32 {
        let days = (self.effective_end_date() - self.start_date).num_days() + 1;
        days.max(1) as u32
    }
}

/// Canonical 128-bit scenario key
///
/// Derived from the normalized request; two practically distinct scenarios
/// produce distinct keys. The key is the only part of the request that ever
/// reaches the durable cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioFingerprint(String);

impl ScenarioFingerprint {
    /// Hex form of the key, suitable for cache-key composition
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScenarioFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the canonical fingerprint for a quote request
///
/// Validates the request first: a malformed scenario must never be hashed,
/// cached, or priced.
pub fn fingerprint(request: &QuoteRequest) -> QEResult<ScenarioFingerprint> {
    validate(request)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical_form(request).as_bytes());
    let digest = hasher.finalize();

    // First 16 bytes of the digest: a 128-bit key, matching the width the
    // scenario cache was designed around.
    let hex: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
    Ok(ScenarioFingerprint(hex))
}

/// Validate the structural invariants of a quote request
pub fn validate(request: &QuoteRequest) -> QEResult<()> {
    if request.excursion_id <= 0 {
        return Err(QuoteEngineError::InvalidRequest(format!(
            "excursion_id must be positive, got {}",
            request.excursion_id
        )));
    }
    if request.participant_count < 1 {
        return Err(QuoteEngineError::InvalidRequest(
            "participant_count must be at least 1".to_string(),
        ));
    }
    if let Some(end) = request.end_date {
        if end < request.start_date {
            return Err(QuoteEngineError::InvalidRequest(format!(
                "end_date {} precedes start_date {}",
                end, request.start_date
            )));
        }
    }
    Ok(())
}

/// Build the canonical byte form that gets hashed
///
/// Extras and activities are sorted by id; duplicate ids are merged by
/// summing quantities and zero quantities are dropped, so selection order
/// and redundant lines never change the scenario identity.
fn canonical_form(request: &QuoteRequest) -> String {
    format!(
        "x{}|p{}|{}|{}|e{}|a{}",
        request.excursion_id,
        request.participant_count,
        request.start_date,
        request.effective_end_date(),
        canonical_lines(&request.extras),
        canonical_lines(&request.activities),
    )
}

fn canonical_lines(lines: &[LineSelection]) -> String {
    let mut merged: BTreeMap<i32, u64> = BTreeMap::new();
    for line in lines {
        if line.qty > 0 {
            *merged.entry(line.id).or_insert(0) += u64::from(line.qty);
        }
    }
    merged
        .iter()
        .map(|(id, qty)| format!("{}:{}", id, qty))
        .collect::<Vec<_>>()
        .join(",")
}
