//! Simulator error types

use contracts::ContractError;
use thiserror::Error;

/// Simulator specific error
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Connection error
    #[error("failed to connect to simulator at {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    /// Operation requires a connected client
    #[error("simulator client is not connected")]
    NotConnected,

    /// Spawn point index outside the map's spawn point list
    #[error("spawn point {index} out of range (map has {available})")]
    SpawnPointOutOfRange { index: usize, available: usize },

    /// Vehicle spawn error
    #[error("failed to spawn '{blueprint}' at spawn point {index}: {message}")]
    VehicleSpawnFailed {
        blueprint: String,
        index: usize,
        message: String,
    },

    /// Planner could not produce a route
    #[error("no route from spawn point {start} to {end}: {message}")]
    RouteUnreachable {
        start: usize,
        end: usize,
        message: String,
    },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SimulatorError {
    pub fn route_unreachable(start: usize, end: usize, message: impl Into<String>) -> Self {
        Self::RouteUnreachable {
            start,
            end,
            message: message.into(),
        }
    }
}

impl From<SimulatorError> for ContractError {
    fn from(err: SimulatorError) -> Self {
        match err {
            SimulatorError::Contract(inner) => inner,
            SimulatorError::ConnectionFailed { .. } | SimulatorError::NotConnected => {
                ContractError::simulator_connection(err.to_string())
            }
            SimulatorError::RouteUnreachable { .. } => {
                ContractError::planner_unavailable(err.to_string())
            }
            SimulatorError::SpawnPointOutOfRange { index, .. } => {
                ContractError::spawn(format!("spawn_point[{index}]"), err.to_string())
            }
            SimulatorError::VehicleSpawnFailed { ref blueprint, .. } => {
                ContractError::spawn(blueprint.clone(), err.to_string())
            }
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SimulatorError>;
