//! Monitoring pipeline orchestration
//!
//! The monitor owns the rolling history buffer and wires the simulator,
//! scorer, anomaly model, and recommendation engine into a single
//! generate → score → detect → recommend cycle per tick.
//!
//! History is exclusively owned here and is both the model's training corpus
//! and the source of recent-window queries. Retraining is explicit and
//! caller-paced; re-fitting on every tick would make the model chase its own
//! noise. The pipeline is synchronous and single-threaded — a surrounding
//! concurrent service must serialize access behind one lock (for example a
//! `Mutex<HealthMonitor>`), since a retrain swaps the fitted model state and
//! must not interleave with prediction.

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detector::{AnomalyDetector, DetectorConfig, ModelMetricsReport, TrainingMetrics};
use crate::error::Result;
use crate::models::{AnomalyVerdict, RecommendationBundle, VitalReading};
use crate::recommendations::RecommendationEngine;
use crate::simulator::{SimulatorConfig, VitalsSimulator};

/// Monitoring pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Rolling history capacity; oldest readings are evicted past this
    pub history_capacity: usize,

    /// Number of hourly readings generated to train the initial model
    pub bootstrap_readings: usize,

    pub simulator: SimulatorConfig,

    pub detector: DetectorConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 200,
            bootstrap_readings: 100,
            simulator: SimulatorConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Everything one monitoring cycle produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorTick {
    pub reading: VitalReading,
    pub verdict: AnomalyVerdict,
    pub recommendations: RecommendationBundle,
}

/// Orchestrates the simulate → score → detect → recommend pipeline
#[derive(Debug)]
pub struct HealthMonitor {
    config: MonitorConfig,
    simulator: VitalsSimulator,
    detector: AnomalyDetector,
    engine: RecommendationEngine,
    history: VecDeque<VitalReading>,
}

impl HealthMonitor {
    /// Seed history with hourly readings spanning the recent past and train
    /// the initial model on them
    pub fn initialize(config: MonitorConfig) -> Result<Self> {
        info!(
            bootstrap = config.bootstrap_readings,
            capacity = config.history_capacity,
            "initializing health monitor"
        );

        let mut simulator = VitalsSimulator::new(config.simulator.clone());
        let mut detector = AnomalyDetector::new(config.detector.clone());

        let now = Utc::now();
        let mut history = VecDeque::with_capacity(config.history_capacity);
        for i in 0..config.bootstrap_readings {
            let offset_hours = (config.bootstrap_readings - i) as i64;
            let timestamp = now - Duration::hours(offset_hours);
            history.push_back(simulator.generate(Some(timestamp)));
        }

        history.make_contiguous();
        detector.train(history.as_slices().0)?;

        info!("health monitor initialized");

        Ok(Self {
            config,
            simulator,
            detector,
            engine: RecommendationEngine::new(),
            history,
        })
    }

    /// One monitoring cycle: generate a reading, fold it into history, score
    /// it against the current model, and derive recommendations
    pub fn tick(&mut self, emergency: bool) -> Result<MonitorTick> {
        let reading = if emergency {
            warn!("generating emergency reading");
            self.simulator.generate_emergency(None)
        } else {
            self.simulator.generate(None)
        };

        self.history.push_back(reading.clone());
        while self.history.len() > self.config.history_capacity {
            self.history.pop_front();
        }

        let verdict = self.detector.predict(&reading)?;
        let recommendations = self.engine.recommend(&reading, &verdict);

        Ok(MonitorTick {
            reading,
            verdict,
            recommendations,
        })
    }

    /// Re-fit the anomaly model over current history.
    ///
    /// A failed retrain leaves the previous model servable; the error is
    /// propagated, not swallowed.
    pub fn retrain(&mut self) -> Result<&TrainingMetrics> {
        info!(history = self.history.len(), "retraining anomaly model");
        self.history.make_contiguous();
        let metrics = self.detector.train(self.history.as_slices().0)?;
        Ok(metrics)
    }

    /// History entries newer than `now - window`, oldest first
    pub fn recent(&self, window: Duration) -> Vec<VitalReading> {
        let cutoff = Utc::now() - window;
        self.history
            .iter()
            .filter(|reading| reading.timestamp > cutoff)
            .cloned()
            .collect()
    }

    /// History entries newer than the given number of hours
    pub fn recent_hours(&self, hours: i64) -> Vec<VitalReading> {
        self.recent(Duration::hours(hours))
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Timestamp of the most recent reading, if any
    pub fn last_reading_at(&self) -> Option<DateTime<Utc>> {
        self.history.back().map(|r| r.timestamp)
    }

    /// Current model evaluation; explicit marker when untrained
    pub fn model_metrics(&self) -> ModelMetricsReport {
        self.detector.metrics()
    }

    /// Persist the fitted model state
    pub fn save_model(&self, path: &Path) -> Result<()> {
        self.detector.save(path)
    }

    /// Restore a previously saved model state; the current model is kept on
    /// failure
    pub fn load_model(&mut self, path: &Path) -> Result<()> {
        self.detector.load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            history_capacity: 50,
            bootstrap_readings: 40,
            simulator: SimulatorConfig {
                seed: Some(21),
                ..Default::default()
            },
            detector: DetectorConfig {
                num_trees: 25,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_initialize_bootstraps_and_trains() {
        let monitor = HealthMonitor::initialize(test_config()).unwrap();
        assert_eq!(monitor.history_len(), 40);

        let report = monitor.model_metrics();
        assert!(report.is_trained);
        assert_eq!(report.metrics.unwrap().total_samples, 40);
    }

    #[test]
    fn test_tick_appends_to_history() {
        let mut monitor = HealthMonitor::initialize(test_config()).unwrap();
        let tick = monitor.tick(false).unwrap();

        assert_eq!(monitor.history_len(), 41);
        assert_eq!(monitor.last_reading_at(), Some(tick.reading.timestamp));
        assert!(tick.recommendations.recommendations.len() <= 4);
    }

    #[test]
    fn test_history_evicts_fifo_past_capacity() {
        let mut monitor = HealthMonitor::initialize(test_config()).unwrap();
        for _ in 0..30 {
            monitor.tick(false).unwrap();
        }
        assert_eq!(monitor.history_len(), 50);

        let oldest = monitor.history.front().unwrap().timestamp;
        monitor.tick(false).unwrap();
        assert_eq!(monitor.history_len(), 50);
        assert!(monitor.history.front().unwrap().timestamp > oldest);
    }

    #[test]
    fn test_emergency_tick_flows_through_pipeline() {
        let mut monitor = HealthMonitor::initialize(test_config()).unwrap();
        let tick = monitor.tick(true).unwrap();

        assert_eq!(tick.reading.heart_rate, 150.0);
        assert_eq!(tick.reading.health_score, 25);
        assert!(tick.reading.is_anomaly);
    }

    #[test]
    fn test_recent_window_filters_bootstrap_readings() {
        let monitor = HealthMonitor::initialize(test_config()).unwrap();
        // Bootstrap readings are one per hour; a 5-hour window keeps only
        // the newest few
        let recent = monitor.recent_hours(5);
        assert!(recent.len() < monitor.history_len());
        assert!(!recent.is_empty());
        let cutoff = Utc::now() - Duration::hours(5);
        assert!(recent.iter().all(|r| r.timestamp > cutoff));
    }

    #[test]
    fn test_retrain_over_current_history() {
        let mut monitor = HealthMonitor::initialize(test_config()).unwrap();
        for _ in 0..10 {
            monitor.tick(false).unwrap();
        }
        let metrics = monitor.retrain().unwrap();
        assert_eq!(metrics.total_samples, 50);
    }
}
