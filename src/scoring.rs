//! Composite health scoring
//!
//! Turns one reading into a bounded 0-100 score by stacking fixed per-metric
//! penalties. The bands are product heuristics carried over from the
//! original monitoring dashboard; the severe band of each metric is checked
//! before the mild band so both are reachable.

use crate::models::VitalReading;

/// Calculate a composite health score in [0, 100].
///
/// Pure and deterministic; the reading's stored `health_score` field is
/// ignored. Multiple penalties stack within one call.
pub fn health_score(reading: &VitalReading) -> u8 {
    let mut score: i32 = 100;

    let hr = reading.heart_rate;
    if hr < 50.0 || hr > 120.0 {
        score -= 30;
    } else if hr < 60.0 || hr > 100.0 {
        score -= 15;
    }

    let spo2 = reading.blood_oxygen;
    if spo2 < 90.0 {
        score -= 50;
    } else if spo2 < 95.0 {
        score -= 25;
    }

    let temp = reading.temperature;
    if temp < 96.0 || temp > 100.0 {
        score -= 20;
    } else if temp < 97.0 || temp > 99.0 {
        score -= 10;
    }

    // Both extremes of activity are mildly concerning
    let activity = reading.activity_level;
    if activity < 2.0 || activity > 8.0 {
        score -= 5;
    }

    let sleep = reading.sleep_quality;
    if sleep < 3.0 {
        score -= 25;
    } else if sleep < 5.0 {
        score -= 15;
    }

    let stress = reading.stress_level;
    if stress > 8.0 {
        score -= 20;
    } else if stress > 7.0 {
        score -= 10;
    }

    score.clamp(0, 100) as u8
}
