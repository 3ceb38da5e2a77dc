//! Quality scoring for sensor readings.
//!
//! Scoring never fails: absent metrics are simply excluded, and every
//! deduction is independent and cumulative. The function is pure, so the
//! asynchronous stage can re-score a reading any number of times and land on
//! the same tier.

use crate::models::{QualityTier, SensorReading};

// ---

/// Score a reading on a 0-100 scale.
///
/// Deductions use plausibility bands, not the validation bands: a
/// temperature of 80 passes validation but is implausible for most
/// deployments and costs 30 points here.
pub fn score(reading: &SensorReading) -> i32 {
    // ---
    let mut score = 100;

    if let Some(t) = reading.temperature {
        if !(-40.0..=60.0).contains(&t) {
            score -= 30;
        }
    }

    if let Some(h) = reading.humidity {
        if !(0.0..=100.0).contains(&h) {
            score -= 30;
        }
    }

    if let Some(b) = reading.battery_level {
        if b < 20.0 {
            score -= 10;
        }
    }

    if let Some(s) = reading.signal_strength {
        if s < 30.0 {
            score -= 10;
        }
    }

    score.max(0)
}

/// Map a score to its tier.
///
/// `QualityTier::Excellent` is never produced; the boundary that would earn
/// it is unspecified, so the map tops out at `Good`.
pub fn tier_of(score: i32) -> QualityTier {
    // ---
    if score >= 80 {
        QualityTier::Good
    } else if score >= 60 {
        QualityTier::Fair
    } else {
        QualityTier::Poor
    }
}

/// Score a reading and return its tier. Idempotent.
pub fn assess(reading: &SensorReading) -> QualityTier {
    tier_of(score(reading))
}
