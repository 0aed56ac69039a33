// Library interface for VitalRS modules
// This allows integration tests to access the core pipeline

pub mod config;
pub mod detector;
pub mod error;
pub mod forest;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod recommendations;
pub mod scaler;
pub mod scoring;
pub mod simulator;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use detector::{AnomalyDetector, DetectorConfig, ModelMetricsReport, TrainingMetrics};
pub use error::{ModelError, Result, VitalsError};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use models::{
    AnomalyVerdict, Priority, RecommendationBundle, RiskLevel, VitalReading, FEATURE_COLUMNS,
};
pub use monitor::{HealthMonitor, MonitorConfig, MonitorTick};
pub use recommendations::RecommendationEngine;
pub use scoring::health_score;
pub use simulator::{SimulatorConfig, VitalsSimulator};
