//! Unified error hierarchy for VitalRS
//!
//! Provides a structured error type system with model lifecycle errors kept
//! separate from I/O and configuration failures, plus integration with the
//! tracing system.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all VitalRS operations
#[derive(Debug, Error)]
pub enum VitalsError {
    /// Anomaly model lifecycle errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Anomaly model lifecycle errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Prediction or save requested before any successful training run
    #[error("model has not been trained yet")]
    NotTrained,

    /// Fitting failed; the previously fitted state is retained
    #[error("training failed: {reason}")]
    Training { reason: String },

    /// Persisted model state could not be restored; in-memory state is retained
    #[error("corrupt model state in {path}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// A reading carried a feature value the model cannot consume
    #[error("invalid input in field {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

/// Result type alias for VitalRS operations
pub type Result<T> = std::result::Result<T, VitalsError>;

impl VitalsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VitalsError::Model(ModelError::NotTrained) => ErrorSeverity::Error,
            VitalsError::Model(ModelError::InvalidInput { .. }) => ErrorSeverity::Warning,
            VitalsError::Model(_) => ErrorSeverity::Error,
            VitalsError::Configuration(_) => ErrorSeverity::Warning,
            VitalsError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            VitalsError::Model(ModelError::NotTrained) => {
                "The anomaly model has not been trained yet. Run initialization first.".to_string()
            }
            VitalsError::Model(ModelError::Training { reason }) => {
                format!(
                    "Model training failed ({}). The previous model remains in use.",
                    reason
                )
            }
            VitalsError::Model(ModelError::CorruptState { path, .. }) => {
                format!(
                    "Saved model state at {} could not be restored. The current model is unchanged.",
                    path.display()
                )
            }
            VitalsError::Configuration(reason) => {
                format!("Configuration problem: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
