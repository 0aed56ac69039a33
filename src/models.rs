use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ModelError;

/// Feature columns consumed by the anomaly model, in fixed order.
///
/// The order is part of the persisted model state; a saved model refuses to
/// load against a different column layout.
pub const FEATURE_COLUMNS: [&str; 8] = [
    "heart_rate",
    "blood_oxygen",
    "temperature",
    "activity_level",
    "sleep_quality",
    "stress_level",
    "resting_heart_rate",
    "heart_rate_variability",
];

/// One synthetic vital-sign observation from a simulated wearable device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,

    /// Heart rate in beats per minute
    pub heart_rate: f64,

    /// Blood oxygen saturation in percent
    pub blood_oxygen: f64,

    /// Body temperature in degrees Fahrenheit
    pub temperature: f64,

    /// Activity level on a 0-10 scale
    pub activity_level: f64,

    /// Sleep quality on a 1-10 scale
    pub sleep_quality: f64,

    /// Stress level on a 1-10 scale
    pub stress_level: f64,

    /// Resting heart rate in beats per minute
    pub resting_heart_rate: f64,

    /// Heart rate variability in milliseconds
    pub heart_rate_variability: f64,

    /// Composite health score (0-100), attached by the scorer
    pub health_score: u8,

    /// Ground-truth anomaly flag set by the simulator.
    ///
    /// Used only for offline model evaluation, never consulted at prediction
    /// time.
    pub is_anomaly: bool,
}

impl VitalReading {
    /// Feature vector in [`FEATURE_COLUMNS`] order
    pub fn feature_vector(&self) -> [f64; 8] {
        [
            self.heart_rate,
            self.blood_oxygen,
            self.temperature,
            self.activity_level,
            self.sleep_quality,
            self.stress_level,
            self.resting_heart_rate,
            self.heart_rate_variability,
        ]
    }

    /// Reject readings the model and recommendation engine cannot consume
    pub fn validate(&self) -> Result<(), ModelError> {
        for (value, field) in self.feature_vector().iter().zip(FEATURE_COLUMNS) {
            if !value.is_finite() {
                return Err(ModelError::InvalidInput {
                    field,
                    reason: format!("value {} is not finite", value),
                });
            }
        }
        Ok(())
    }
}

/// Severity tier assigned to an anomalous reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Derive the tier from a signed decision score.
    ///
    /// Non-anomalous readings are always Low; for anomalies the tier grows
    /// with the distance below the decision boundary.
    pub fn from_score(anomaly_score: f64, is_anomaly: bool) -> Self {
        if !is_anomaly {
            return RiskLevel::Low;
        }
        if anomaly_score < -0.10 {
            RiskLevel::High
        } else if anomaly_score < -0.05 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Urgency tag attached to a recommendation bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

/// Output of a single anomaly prediction.
///
/// Derived purely from the decision score and outlier label; never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    /// Whether the model labelled the reading an outlier
    pub is_anomaly: bool,

    /// Signed decision score; more negative = more anomalous
    pub anomaly_score: f64,

    /// Distance from the decision boundary
    pub confidence: f64,

    /// Severity tier derived from the decision score
    pub risk_level: RiskLevel,

    /// Display string for dashboards
    pub status: String,
}

impl AnomalyVerdict {
    /// Build a verdict from a signed decision score
    pub fn from_score(anomaly_score: f64, is_anomaly: bool) -> Self {
        let status = if is_anomaly {
            "Anomaly Detected"
        } else {
            "Normal"
        };
        Self {
            is_anomaly,
            anomaly_score,
            confidence: anomaly_score.abs(),
            risk_level: RiskLevel::from_score(anomaly_score, is_anomaly),
            status: status.to_string(),
        }
    }
}

/// Prioritized advisory output for one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationBundle {
    /// At most four advisory lines, earliest-appended first
    pub recommendations: Vec<String>,

    /// Urgency of acting on the advice
    pub priority: Priority,

    /// When the bundle was produced
    pub generated_at: DateTime<Utc>,

    /// Health score of the reading the advice was derived from
    pub health_score: u8,

    /// Number of advisory lines in the bundle
    pub total_recommendations: usize,
}
