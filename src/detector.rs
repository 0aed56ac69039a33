//! Anomaly model lifecycle
//!
//! Wraps the feature scaler and isolation forest into one train/predict/
//! retrain unit. Ground-truth anomaly labels from the simulator are sparse
//! and synthetic, so the model fits fully unsupervised; labels are used only
//! for post-hoc accuracy reporting, never for fitting.
//!
//! # Decision scores
//!
//! The forest's negated anomaly score is shifted by a contamination
//! quantile fitted on the training data:
//! `decision(x) = score_samples(x) - offset`, where `offset` is the
//! contamination-quantile of the training scores. A negative decision marks
//! an outlier, and roughly the contamination fraction of the training set
//! lands below zero.
//!
//! # Fitted-state atomicity
//!
//! Training builds a complete new fitted state (scaler, forest, offset,
//! metrics) before swapping it in. If any fitting step fails, the previous
//! state stays live and remains servable for prediction.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ModelError, Result};
use crate::forest::{ForestConfig, IsolationForest};
use crate::models::{AnomalyVerdict, VitalReading, FEATURE_COLUMNS};
use crate::scaler::StandardScaler;

/// Persisted model-state schema version
pub const MODEL_STATE_VERSION: u32 = 1;

/// Anomaly detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Expected fraction of outliers in the training data
    pub contamination: f64,

    /// Number of isolation trees
    pub num_trees: usize,

    /// Per-tree subsample size
    pub sample_size: usize,

    /// Base RNG seed for tree construction
    pub seed: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            num_trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

/// Precision/recall/F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Number of ground-truth members of the class
    pub support: usize,
}

/// Per-class breakdown of training-time evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub normal: ClassMetrics,
    pub anomaly: ClassMetrics,
}

/// Snapshot of model quality against the simulator's ground truth.
///
/// Immutable once produced; replaced wholesale on retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Agreement with ground-truth flags over the training set
    pub accuracy: f64,

    /// Rows = actual (normal, anomaly); columns = predicted
    pub confusion_matrix: [[usize; 2]; 2],

    pub classification_report: ClassificationReport,

    pub total_samples: usize,

    /// Readings the model labelled anomalous
    pub detected_anomalies: usize,

    /// Readings the simulator flagged anomalous
    pub actual_anomalies: usize,
}

impl TrainingMetrics {
    /// Compare model labels against ground truth
    fn evaluate(predicted: &[bool], actual: &[bool]) -> Self {
        let mut tn = 0_usize;
        let mut fp = 0_usize;
        let mut fn_ = 0_usize;
        let mut tp = 0_usize;

        for (&p, &a) in predicted.iter().zip(actual) {
            match (a, p) {
                (false, false) => tn += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (true, true) => tp += 1,
            }
        }

        let total = predicted.len();
        let normal = class_metrics(tn, fn_, fp);
        let anomaly = class_metrics(tp, fp, fn_);

        Self {
            accuracy: ratio(tn + tp, total),
            confusion_matrix: [[tn, fp], [fn_, tp]],
            classification_report: ClassificationReport { normal, anomaly },
            total_samples: total,
            detected_anomalies: tp + fp,
            actual_anomalies: tp + fn_,
        }
    }
}

/// Metrics for one class from its true-positive/false counts.
///
/// `true_hits` = correctly labelled members, `false_hits` = other-class
/// members pulled in, `misses` = members labelled as the other class.
fn class_metrics(true_hits: usize, false_hits: usize, misses: usize) -> ClassMetrics {
    let precision = ratio(true_hits, true_hits + false_hits);
    let recall = ratio(true_hits, true_hits + misses);
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassMetrics {
        precision,
        recall,
        f1_score,
        support: true_hits + misses,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Caller-facing metrics query result; untrained models yield an explicit
/// marker instead of an error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetricsReport {
    pub is_trained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TrainingMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Feature listing for callers asking which inputs drive the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub features: Vec<String>,
    pub note: String,
}

/// Fitted scaler + forest + decision offset + evaluation, swapped as a unit
#[derive(Debug, Clone, PartialEq)]
struct FittedState {
    scaler: StandardScaler,
    forest: IsolationForest,
    offset: f64,
    metrics: TrainingMetrics,
}

/// Versioned on-disk model state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelState {
    version: u32,
    feature_columns: Vec<String>,
    contamination: f64,
    scaler: StandardScaler,
    forest: IsolationForest,
    offset: f64,
    metrics: TrainingMetrics,
}

/// Unsupervised outlier detector over vital-sign readings
#[derive(Debug)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    fitted: Option<FittedState>,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit scaler and forest over `readings` and record evaluation metrics.
    ///
    /// Requires at least one reading. On any failure the previously fitted
    /// state is retained.
    pub fn train(&mut self, readings: &[VitalReading]) -> std::result::Result<&TrainingMetrics, ModelError> {
        if readings.is_empty() {
            return Err(ModelError::Training {
                reason: "training set is empty".to_string(),
            });
        }
        for reading in readings {
            reading.validate().map_err(|err| ModelError::Training {
                reason: err.to_string(),
            })?;
        }

        info!(samples = readings.len(), "training anomaly model");

        let matrix: Vec<Vec<f64>> = readings
            .iter()
            .map(|r| r.feature_vector().to_vec())
            .collect();
        let scaler = StandardScaler::fit(&matrix)?;
        let scaled = scaler.transform(&matrix);

        let forest_config = ForestConfig {
            num_trees: self.config.num_trees,
            sample_size: self.config.sample_size,
            seed: self.config.seed,
        };
        let forest = IsolationForest::fit(&scaled, &forest_config)?;

        let scores: Vec<f64> = scaled.iter().map(|row| forest.score_samples(row)).collect();
        let offset = quantile(&scores, self.config.contamination);

        let predicted: Vec<bool> = scores.iter().map(|s| s - offset < 0.0).collect();
        let actual: Vec<bool> = readings.iter().map(|r| r.is_anomaly).collect();
        let metrics = TrainingMetrics::evaluate(&predicted, &actual);

        info!(
            accuracy = metrics.accuracy,
            detected = metrics.detected_anomalies,
            actual = metrics.actual_anomalies,
            "anomaly model trained"
        );

        let state = self.fitted.insert(FittedState {
            scaler,
            forest,
            offset,
            metrics,
        });
        Ok(&state.metrics)
    }

    /// Score one reading against the fitted model
    pub fn predict(&self, reading: &VitalReading) -> std::result::Result<AnomalyVerdict, ModelError> {
        let state = self.fitted.as_ref().ok_or(ModelError::NotTrained)?;
        reading.validate()?;

        let scaled = state.scaler.transform_row(&reading.feature_vector());
        let decision = state.forest.score_samples(&scaled) - state.offset;
        let verdict = AnomalyVerdict::from_score(decision, decision < 0.0);

        debug!(
            anomaly_score = verdict.anomaly_score,
            is_anomaly = verdict.is_anomaly,
            risk = %verdict.risk_level,
            "prediction"
        );

        Ok(verdict)
    }

    /// Metrics query; never fails, untrained models report an explicit marker
    pub fn metrics(&self) -> ModelMetricsReport {
        match &self.fitted {
            Some(state) => ModelMetricsReport {
                is_trained: true,
                training_accuracy: Some(state.metrics.accuracy),
                metrics: Some(state.metrics.clone()),
                error: None,
            },
            None => ModelMetricsReport {
                is_trained: false,
                training_accuracy: None,
                metrics: None,
                error: Some("Model not trained yet".to_string()),
            },
        }
    }

    /// Features feeding the model; isolation forests weigh all of them
    pub fn feature_importance(&self) -> Option<FeatureImportance> {
        self.fitted.as_ref()?;
        Some(FeatureImportance {
            features: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            note: "Isolation forest uses all features for anomaly detection".to_string(),
        })
    }

    /// Serialize the fitted state as one versioned JSON document
    pub fn save(&self, path: &Path) -> Result<()> {
        let state = self.fitted.as_ref().ok_or(ModelError::NotTrained)?;

        let doc = ModelState {
            version: MODEL_STATE_VERSION,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            contamination: self.config.contamination,
            scaler: state.scaler.clone(),
            forest: state.forest.clone(),
            offset: state.offset,
            metrics: state.metrics.clone(),
        };

        let json = serde_json::to_string_pretty(&doc)?;
        fs::write(path, json)?;

        info!(path = %path.display(), "model state saved");
        Ok(())
    }

    /// Restore fitted state from a saved document.
    ///
    /// On any failure the in-memory model is left untouched.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path)?;

        let doc: ModelState =
            serde_json::from_str(&raw).map_err(|err| ModelError::CorruptState {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        if doc.version != MODEL_STATE_VERSION {
            return Err(ModelError::CorruptState {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported state version {} (expected {})",
                    doc.version, MODEL_STATE_VERSION
                ),
            }
            .into());
        }
        if !doc.feature_columns.iter().map(String::as_str).eq(FEATURE_COLUMNS) {
            return Err(ModelError::CorruptState {
                path: path.to_path_buf(),
                reason: "feature column mismatch".to_string(),
            }
            .into());
        }
        if doc.scaler.n_features() != FEATURE_COLUMNS.len() {
            return Err(ModelError::CorruptState {
                path: path.to_path_buf(),
                reason: "scaler dimension mismatch".to_string(),
            }
            .into());
        }

        self.config.contamination = doc.contamination;
        self.fitted = Some(FittedState {
            scaler: doc.scaler,
            forest: doc.forest,
            offset: doc.offset,
            metrics: doc.metrics,
        });

        info!(path = %path.display(), "model state loaded");
        Ok(())
    }
}

/// Quantile with linear interpolation over a copy of `values`
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VitalsError;
    use crate::simulator::{SimulatorConfig, VitalsSimulator};
    use chrono::{TimeZone, Utc};

    fn training_readings(count: usize) -> Vec<VitalReading> {
        let mut sim = VitalsSimulator::new(SimulatorConfig {
            seed: Some(9),
            ..Default::default()
        });
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        sim.generate_batch(count, Some(start))
    }

    fn trained_detector() -> (AnomalyDetector, Vec<VitalReading>) {
        let readings = training_readings(200);
        let mut detector = AnomalyDetector::new(DetectorConfig::default());
        detector.train(&readings).unwrap();
        (detector, readings)
    }

    #[test]
    fn test_predict_before_train_fails() {
        let detector = AnomalyDetector::new(DetectorConfig::default());
        let reading = training_readings(1).remove(0);
        assert!(matches!(
            detector.predict(&reading),
            Err(ModelError::NotTrained)
        ));
    }

    #[test]
    fn test_train_then_predict_succeeds_for_all_readings() {
        let (detector, readings) = trained_detector();
        assert!(detector.is_trained());
        for reading in &readings {
            let verdict = detector.predict(reading).unwrap();
            assert!(verdict.anomaly_score.is_finite());
            assert_eq!(verdict.confidence, verdict.anomaly_score.abs());
        }
    }

    #[test]
    fn test_training_metrics_are_consistent() {
        let (detector, readings) = trained_detector();
        let report = detector.metrics();
        assert!(report.is_trained);
        assert!(report.error.is_none());

        let metrics = report.metrics.unwrap();
        assert_eq!(metrics.total_samples, readings.len());

        let cells: usize = metrics.confusion_matrix.iter().flatten().sum();
        assert_eq!(cells, readings.len());

        let [[tn, fp], [fn_, tp]] = metrics.confusion_matrix;
        assert_eq!(metrics.detected_anomalies, tp + fp);
        assert_eq!(metrics.actual_anomalies, tp + fn_);
        assert_eq!(metrics.classification_report.normal.support, tn + fp);
        assert_eq!(metrics.classification_report.anomaly.support, tp + fn_);
        assert!((0.0..=1.0).contains(&metrics.accuracy));
    }

    #[test]
    fn test_detected_fraction_tracks_contamination() {
        let (detector, readings) = trained_detector();
        let detected = detector.metrics().metrics.unwrap().detected_anomalies;
        let fraction = detected as f64 / readings.len() as f64;
        assert!(
            (0.01..=0.25).contains(&fraction),
            "detected fraction {fraction}"
        );
    }

    #[test]
    fn test_untrained_metrics_report_marker() {
        let detector = AnomalyDetector::new(DetectorConfig::default());
        let report = detector.metrics();
        assert!(!report.is_trained);
        assert!(report.training_accuracy.is_none());
        assert_eq!(report.error.as_deref(), Some("Model not trained yet"));
        assert!(detector.feature_importance().is_none());
    }

    #[test]
    fn test_retrain_failure_keeps_previous_state() {
        let (mut detector, readings) = trained_detector();
        let before = detector.metrics().metrics.unwrap();
        let probe = &readings[0];
        let verdict_before = detector.predict(probe).unwrap();

        let err = detector.train(&[]).unwrap_err();
        assert!(matches!(err, ModelError::Training { .. }));

        assert!(detector.is_trained());
        assert_eq!(detector.metrics().metrics.unwrap(), before);
        assert_eq!(detector.predict(probe).unwrap(), verdict_before);
    }

    #[test]
    fn test_train_rejects_non_finite_reading() {
        let mut readings = training_readings(10);
        readings[3].blood_oxygen = f64::INFINITY;
        let mut detector = AnomalyDetector::new(DetectorConfig::default());
        assert!(matches!(
            detector.train(&readings),
            Err(ModelError::Training { .. })
        ));
        assert!(!detector.is_trained());
    }

    #[test]
    fn test_predict_rejects_non_finite_reading() {
        let (detector, readings) = trained_detector();
        let mut reading = readings[0].clone();
        reading.stress_level = f64::NAN;
        assert!(matches!(
            detector.predict(&reading),
            Err(ModelError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_save_untrained_fails() {
        let detector = AnomalyDetector::new(DetectorConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let err = detector.save(&dir.path().join("model.json")).unwrap_err();
        assert!(matches!(
            err,
            VitalsError::Model(ModelError::NotTrained)
        ));
    }

    #[test]
    fn test_save_load_round_trip_preserves_predictions() {
        let (detector, readings) = trained_detector();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        detector.save(&path).unwrap();

        let mut restored = AnomalyDetector::new(DetectorConfig::default());
        restored.load(&path).unwrap();

        for probe in readings.iter().take(20) {
            assert_eq!(
                detector.predict(probe).unwrap(),
                restored.predict(probe).unwrap()
            );
        }
        assert_eq!(
            detector.metrics().metrics.unwrap(),
            restored.metrics().metrics.unwrap()
        );
    }

    #[test]
    fn test_load_corrupt_state_keeps_prior_model() {
        let (mut detector, readings) = trained_detector();
        let probe = &readings[0];
        let verdict_before = detector.predict(probe).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let err = detector.load(&path).unwrap_err();
        assert!(matches!(
            err,
            VitalsError::Model(ModelError::CorruptState { .. })
        ));
        assert_eq!(detector.predict(probe).unwrap(), verdict_before);
    }

    #[test]
    fn test_load_rejects_wrong_version() {
        let (detector, _) = trained_detector();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        detector.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let tampered = raw.replacen("\"version\": 1", "\"version\": 99", 1);
        assert_ne!(raw, tampered);
        std::fs::write(&path, tampered).unwrap();

        let mut fresh = AnomalyDetector::new(DetectorConfig::default());
        let err = fresh.load(&path).unwrap_err();
        assert!(matches!(
            err,
            VitalsError::Model(ModelError::CorruptState { .. })
        ));
        assert!(!fresh.is_trained());
    }

    #[test]
    fn test_quantile_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&values, 0.1) - 1.3).abs() < 1e-12);
    }
}
