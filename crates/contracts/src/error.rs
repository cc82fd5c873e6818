//! Layered error definitions
//!
//! Categorized by source: config / simulator / collection / persistence

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Simulator Errors =====
    /// Simulator connection error
    #[error("simulator connection error: {message}")]
    SimulatorConnection { message: String },

    /// Actor spawn error
    #[error("spawn error for '{actor}': {message}")]
    Spawn { actor: String, message: String },

    /// No camera frame arrived within the allowed number of ticks
    #[error("sensor timeout: no frame after {ticks} ticks")]
    SensorTimeout { ticks: u64 },

    /// Malformed frame from the simulator
    #[error("invalid frame: {message}")]
    InvalidFrame { message: String },

    /// Route planner missing or unable to plan
    #[error("planner unavailable: {message}")]
    PlannerUnavailable { message: String },

    // ===== Collection Errors =====
    /// Segment buffer already holds its maximum number of samples
    #[error("segment capacity exceeded: max={max}")]
    CapacityExceeded { max: usize },

    // ===== Persistence Errors =====
    /// Chunk write failed
    #[error("persistence failure for '{}': {message}", path.display())]
    PersistenceFailure { path: PathBuf, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn simulator_connection(message: impl Into<String>) -> Self {
        Self::SimulatorConnection {
            message: message.into(),
        }
    }

    /// Create spawn error
    pub fn spawn(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            actor: actor.into(),
            message: message.into(),
        }
    }

    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    pub fn planner_unavailable(message: impl Into<String>) -> Self {
        Self::PlannerUnavailable {
            message: message.into(),
        }
    }

    /// Create persistence failure
    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PersistenceFailure {
            path: path.into(),
            message: message.into(),
        }
    }
}
