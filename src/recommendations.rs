//! Recommendation derivation
//!
//! Maps a reading plus its anomaly verdict to a short, prioritized list of
//! advisory lines. Deterministic given its inputs: template lines are
//! appended in a fixed evaluation order, deduplicated, and capped at four
//! entries. Faults never propagate to the caller; the engine degrades to a
//! single fallback line with Low priority and logs the cause.

use chrono::Utc;
use tracing::error;

use crate::error::ModelError;
use crate::models::{AnomalyVerdict, Priority, RecommendationBundle, RiskLevel, VitalReading};

/// Hard cap on advisory lines per bundle
const MAX_RECOMMENDATIONS: usize = 4;

const HEART_RATE_HIGH: [&str; 4] = [
    "Your heart rate is elevated. Consider taking slow, deep breaths.",
    "Try some light stretching or meditation to help lower your heart rate.",
    "Avoid caffeine and consider hydrating with water.",
    "If this persists, consider consulting with a healthcare provider.",
];

const HEART_RATE_LOW: [&str; 4] = [
    "Your heart rate is lower than normal. This might be due to rest or fitness.",
    "If you feel dizzy or weak, consider light movement or sitting up slowly.",
    "Monitor for any symptoms like fatigue or dizziness.",
    "Consider consulting a healthcare provider if this is unusual for you.",
];

const BLOOD_OXYGEN_LOW: [&str; 4] = [
    "Your blood oxygen level is below normal. Ensure good ventilation.",
    "Try taking slow, deep breaths to improve oxygen saturation.",
    "Consider moving to fresh air if you're in a stuffy environment.",
    "If levels remain low or you feel short of breath, seek medical attention.",
];

const TEMPERATURE_HIGH: [&str; 4] = [
    "Your body temperature is elevated. Stay hydrated and rest.",
    "Consider removing excess clothing and staying in a cool environment.",
    "Monitor your temperature regularly and watch for other symptoms.",
    "If fever persists or rises above 101°F, consider consulting a healthcare provider.",
];

const TEMPERATURE_LOW: [&str; 4] = [
    "Your body temperature is lower than normal. Keep warm and stay active.",
    "Consider warm beverages and additional clothing.",
    "Light physical activity can help raise body temperature.",
    "If you feel very cold or shivering persists, seek warmth immediately.",
];

const ACTIVITY_LOW: [&str; 4] = [
    "Your activity level is quite low today. Consider some light movement.",
    "Try a short walk or gentle stretching to boost your activity.",
    "Even small movements can improve circulation and mood.",
    "Set a goal for gradual increase in daily activity.",
];

const ACTIVITY_HIGH: [&str; 4] = [
    "You've been very active! Make sure to stay hydrated and rest when needed.",
    "Listen to your body and take breaks if you feel fatigued.",
    "Consider some gentle stretching to help with recovery.",
    "Ensure you're getting adequate nutrition for your activity level.",
];

const SLEEP_POOR: [&str; 4] = [
    "Your sleep quality seems poor. Consider establishing a regular bedtime routine.",
    "Avoid screens and caffeine before bedtime for better sleep.",
    "Create a comfortable, cool, and dark sleeping environment.",
    "If sleep issues persist, consider consulting with a healthcare provider.",
];

const STRESS_HIGH: [&str; 4] = [
    "Your stress level is elevated. Try some relaxation techniques.",
    "Consider deep breathing exercises or short meditation sessions.",
    "Take breaks from stressful activities when possible.",
    "Physical activity or talking to someone can help reduce stress.",
];

const GENERAL_ANOMALY: [&str; 4] = [
    "We've detected some unusual patterns in your health data.",
    "Consider monitoring your symptoms and how you're feeling overall.",
    "Maintain regular healthy habits: proper sleep, nutrition, and hydration.",
    "If you're experiencing any concerning symptoms, consult with a healthcare provider.",
];

const GENERAL_HEALTHY: [&str; 4] = [
    "Your health metrics look good! Keep up the healthy habits.",
    "Continue with regular exercise, proper sleep, and good nutrition.",
    "Stay hydrated throughout the day.",
    "Regular monitoring helps maintain awareness of your health patterns.",
];

const HIGH_RISK_ALERT: &str =
    "⚠️ High risk detected - consider immediate attention to your health metrics.";

const MODERATE_CONCERN: &str = "⚡ Moderate concern - monitor your symptoms closely.";

const LOW_SCORE_LINE: &str =
    "Your overall health score suggests room for improvement in multiple areas.";

const HIGH_SCORE_LINE: &str = "Excellent health score! You're maintaining great health habits.";

const FALLBACK: &str = "Unable to generate recommendations at this time.";

/// Derives prioritized advice from a reading and its anomaly verdict
#[derive(Debug, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Produce the advisory bundle for one reading.
    ///
    /// Never fails: internal faults degrade to a single fallback line with
    /// Low priority.
    pub fn recommend(
        &self,
        reading: &VitalReading,
        verdict: &AnomalyVerdict,
    ) -> RecommendationBundle {
        let (recommendations, priority) = match self.build(reading, verdict) {
            Ok(lines) => (lines, priority_for(reading, verdict)),
            Err(err) => {
                error!(error = %err, "failed to generate recommendations");
                (vec![FALLBACK.to_string()], Priority::Low)
            }
        };

        RecommendationBundle {
            total_recommendations: recommendations.len(),
            recommendations,
            priority,
            generated_at: Utc::now(),
            health_score: reading.health_score,
        }
    }

    fn build(
        &self,
        reading: &VitalReading,
        verdict: &AnomalyVerdict,
    ) -> Result<Vec<String>, ModelError> {
        reading.validate()?;

        let mut lines: Vec<String> = Vec::new();

        if verdict.is_anomaly {
            extend(&mut lines, &GENERAL_ANOMALY[..2]);
            match verdict.risk_level {
                RiskLevel::High => lines.push(HIGH_RISK_ALERT.to_string()),
                RiskLevel::Medium => lines.push(MODERATE_CONCERN.to_string()),
                RiskLevel::Low => {}
            }
        }

        // Per-metric advice in fixed evaluation order; the high/low bands of
        // each metric are mutually exclusive
        if reading.heart_rate > 100.0 {
            extend(&mut lines, &HEART_RATE_HIGH[..2]);
        } else if reading.heart_rate < 60.0 {
            extend(&mut lines, &HEART_RATE_LOW[..2]);
        }

        if reading.blood_oxygen < 95.0 {
            extend(&mut lines, &BLOOD_OXYGEN_LOW[..2]);
        }

        if reading.temperature > 99.5 {
            extend(&mut lines, &TEMPERATURE_HIGH[..2]);
        } else if reading.temperature < 97.0 {
            extend(&mut lines, &TEMPERATURE_LOW[..2]);
        }

        if reading.activity_level < 2.0 {
            extend(&mut lines, &ACTIVITY_LOW[..1]);
        } else if reading.activity_level > 8.0 {
            extend(&mut lines, &ACTIVITY_HIGH[..1]);
        }

        if reading.sleep_quality < 5.0 {
            extend(&mut lines, &SLEEP_POOR[..1]);
        }

        if reading.stress_level > 7.0 {
            extend(&mut lines, &STRESS_HIGH[..1]);
        }

        if !verdict.is_anomaly && lines.is_empty() {
            extend(&mut lines, &GENERAL_HEALTHY[..2]);
        }

        if reading.health_score < 70 {
            lines.push(LOW_SCORE_LINE.to_string());
        } else if reading.health_score >= 90 {
            lines.push(HIGH_SCORE_LINE.to_string());
        }

        dedup_preserving_order(&mut lines);
        lines.truncate(MAX_RECOMMENDATIONS);
        Ok(lines)
    }
}

/// Urgency of the bundle; risk-level checks come before raw-metric checks
/// at each tier
fn priority_for(reading: &VitalReading, verdict: &AnomalyVerdict) -> Priority {
    let hr = reading.heart_rate;
    let spo2 = reading.blood_oxygen;
    let temp = reading.temperature;

    if verdict.risk_level == RiskLevel::High
        || hr > 120.0
        || hr < 50.0
        || spo2 < 90.0
        || temp > 101.0
        || temp < 95.0
    {
        return Priority::High;
    }

    if verdict.risk_level == RiskLevel::Medium
        || hr > 100.0
        || hr < 60.0
        || spo2 < 95.0
        || temp > 99.5
        || temp < 97.0
    {
        return Priority::Medium;
    }

    Priority::Low
}

fn extend(lines: &mut Vec<String>, templates: &[&str]) {
    lines.extend(templates.iter().map(|t| t.to_string()));
}

/// Drop repeated lines, keeping the earliest occurrence
fn dedup_preserving_order(lines: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    lines.retain(|line| seen.insert(line.clone()));
}
