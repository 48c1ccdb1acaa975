//! Effective-mass scoring
//!
//! The gravity model behind re-ranking: every chunk carries a *mass* built
//! from how often it is accessed and referenced plus any deliberate boosts,
//! discounted by how long ago it was last written.
//!
//! # Why write recency, not access recency
//!
//! Decay keys off `last_written_at`. An old note that is reread daily keeps
//! accumulating accesses, but rereading does not make it authoritative; only
//! a fresh write does. Driving decay from access time would let stale notes
//! masquerade as current.
//!
//! # The model
//!
//! ```text
//! base_mass        = access_count * 0.3 + reference_count * 0.5 + explicit
//! recency_factor   = 1 / (1 + days_since_write * decay_rate)
//! authority_boost  = boost      if days_since_write < 2.0 else 0
//! effective_mass   = min(base_mass * recency_factor + authority_boost, cap)
//! score_modifier   = 1 + 0.1 * ln(1 + effective_mass)
//! ```
//!
//! The modifier is >= 1.0 and log-damped, so heavy access history nudges a
//! similarity score upward without ever drowning out the similarity signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    ACCESS_WEIGHT, AUTHORITY_WINDOW_DAYS, DEFAULT_AUTHORITY_BOOST, DEFAULT_DECAY_RATE,
    DEFAULT_MASS_CAP, MISSING_TIMESTAMP_DAYS, MODIFIER_LOG_SCALE, REFERENCE_WEIGHT,
};

/// All knobs of the mass formula in one place.
///
/// Constructed from `Config`; tests build custom instances directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringParams {
    pub access_weight: f64,
    pub reference_weight: f64,
    pub decay_rate: f64,
    pub authority_boost: f64,
    pub authority_window_days: f64,
    pub mass_cap: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            access_weight: ACCESS_WEIGHT,
            reference_weight: REFERENCE_WEIGHT,
            decay_rate: DEFAULT_DECAY_RATE,
            authority_boost: DEFAULT_AUTHORITY_BOOST,
            authority_window_days: AUTHORITY_WINDOW_DAYS,
            mass_cap: DEFAULT_MASS_CAP,
        }
    }
}

/// Days elapsed since `ts`, or [`MISSING_TIMESTAMP_DAYS`] when absent.
///
/// Negative elapsed time (clock skew, future-dated rows) clamps to zero.
pub fn days_since(now: DateTime<Utc>, ts: Option<DateTime<Utc>>) -> f64 {
    match ts {
        Some(ts) => {
            let secs = (now - ts).num_seconds() as f64;
            (secs / 86_400.0).max(0.0)
        }
        None => MISSING_TIMESTAMP_DAYS,
    }
}

/// Raw importance before any temporal adjustment.
pub fn base_mass(
    access_count: u64,
    reference_count: u64,
    explicit_importance: f64,
    params: &ScoringParams,
) -> f64 {
    access_count as f64 * params.access_weight
        + reference_count as f64 * params.reference_weight
        + explicit_importance
}

/// The decay-and-authority-adjusted importance of a chunk.
pub fn effective_mass(
    access_count: u64,
    reference_count: u64,
    explicit_importance: f64,
    days_since_write: f64,
    params: &ScoringParams,
) -> f64 {
    let base = base_mass(access_count, reference_count, explicit_importance, params);
    let recency_factor = 1.0 / (1.0 + days_since_write * params.decay_rate);
    let authority = if days_since_write < params.authority_window_days {
        params.authority_boost
    } else {
        0.0
    };
    (base * recency_factor + authority).min(params.mass_cap)
}

/// Multiplier applied to a base similarity score during re-ranking.
///
/// Always >= 1.0; grows logarithmically with mass.
pub fn score_modifier(effective_mass: f64) -> f64 {
    1.0 + MODIFIER_LOG_SCALE * (1.0 + effective_mass.max(0.0)).ln()
}

/// Final-score multiplier used by the search orchestrator, which works from
/// the bare access count of a candidate rather than the full mass formula.
///
/// `1 + ln(access_count + 1)` — unboosted candidates score exactly 1.0.
pub fn access_multiplier(access_count: u64) -> f64 {
    1.0 + ((access_count as f64) + 1.0).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn params() -> ScoringParams {
        ScoringParams::default()
    }

    #[test]
    fn test_mass_monotone_in_counters() {
        let p = params();
        let m0 = effective_mass(0, 0, 0.0, 1.0, &p);
        let m_access = effective_mass(5, 0, 0.0, 1.0, &p);
        let m_refs = effective_mass(5, 3, 0.0, 1.0, &p);
        let m_explicit = effective_mass(5, 3, 2.0, 1.0, &p);

        assert!(m_access > m0);
        assert!(m_refs > m_access);
        assert!(m_explicit > m_refs);
    }

    #[test]
    fn test_mass_never_exceeds_cap() {
        let p = params();
        let m = effective_mass(1_000_000, 1_000_000, 1e9, 0.0, &p);
        assert!(m <= p.mass_cap);
    }

    #[test]
    fn test_recency_discount() {
        let p = params();
        // Same counters, older write -> smaller mass (outside authority window)
        let fresh = effective_mass(10, 0, 0.0, 3.0, &p);
        let stale = effective_mass(10, 0, 0.0, 30.0, &p);
        assert!(fresh > stale);
    }

    #[test]
    fn test_authority_boost_window() {
        let p = params();
        let inside = effective_mass(0, 0, 0.0, 1.9, &p);
        let outside = effective_mass(0, 0, 0.0, 2.0, &p);

        assert!((inside - p.authority_boost).abs() < 1e-9);
        assert_eq!(outside, 0.0);
    }

    #[test]
    fn test_missing_timestamp_is_maximally_stale() {
        let now = Utc::now();
        assert_eq!(days_since(now, None), MISSING_TIMESTAMP_DAYS);

        let two_days_ago = now - Duration::hours(48);
        let d = days_since(now, Some(two_days_ago));
        assert!((d - 2.0).abs() < 1e-6);

        // Future timestamps clamp to zero instead of producing negative age
        let future = now + Duration::hours(4);
        assert_eq!(days_since(now, Some(future)), 0.0);
    }

    #[test]
    fn test_modifier_floor_and_damping() {
        assert_eq!(score_modifier(0.0), 1.0);
        assert!(score_modifier(-5.0) >= 1.0);

        // Log damping: each doubling of mass adds less than the one before
        let step1 = score_modifier(2.0) - score_modifier(1.0);
        let step2 = score_modifier(4.0) - score_modifier(2.0);
        assert!(step2 / 2.0 < step1);
    }

    #[test]
    fn test_access_multiplier_examples() {
        assert!((access_multiplier(0) - 1.0).abs() < 1e-9);
        // ln(10) ~ 2.303
        assert!((access_multiplier(9) - 3.302_585_09).abs() < 1e-6);
    }
}
