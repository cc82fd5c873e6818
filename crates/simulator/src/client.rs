//! Simulator client abstraction
//!
//! Defines the operations the collector needs from a driving simulator,
//! supporting a real implementation and mock testing.

use std::future::Future;

use contracts::{CameraConfig, FrameSource, Location, RoadOption, SimulatorConfig, VehicleConfig};

use crate::error::Result;

/// One stretch of a planned route sharing the same road option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLeg {
    pub option: RoadOption,
    /// Simulation ticks the ego vehicle spends on this leg
    pub ticks: u64,
}

impl RouteLeg {
    pub const fn new(option: RoadOption, ticks: u64) -> Self {
        Self { option, ticks }
    }
}

/// Result of tracing a route between two spawn points
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub start: usize,
    pub end: usize,
    /// Driven length along the road network (m)
    pub length_m: f64,
    pub legs: Vec<RouteLeg>,
}

impl RoutePlan {
    /// Ticks needed to drive the whole route.
    pub fn total_ticks(&self) -> u64 {
        self.legs.iter().map(|leg| leg.ticks).sum()
    }
}

/// Simulator client trait
///
/// Abstracts the simulator operations used by the collector. `Drive` is the
/// per-tick view of a spawned ego vehicle following a planned route.
pub trait SimulatorClient: Send {
    type Drive: FrameSource;

    /// Connect and switch the world to synchronous mode
    fn connect(&mut self, config: &SimulatorConfig) -> impl Future<Output = Result<()>> + Send;

    /// Spawn points of the loaded map, in map order
    fn spawn_points(&self) -> Result<Vec<Location>>;

    /// Ask the global planner for a route
    fn trace_route(
        &self,
        start: usize,
        end: usize,
    ) -> impl Future<Output = Result<RoutePlan>> + Send;

    /// Spawn the ego vehicle with its camera and an agent driving `start -> end`
    fn spawn_ego(
        &mut self,
        vehicle: &VehicleConfig,
        camera: &CameraConfig,
        start: usize,
        end: usize,
    ) -> impl Future<Output = Result<Self::Drive>> + Send;

    /// Destroy the ego vehicle and its sensors
    ///
    /// Idempotent: tearing down an already destroyed drive is Ok
    fn teardown(&mut self, drive: Self::Drive) -> impl Future<Output = Result<()>> + Send;
}

/// Straight-line distance between two map locations (m).
pub fn distance(a: &Location, b: &Location) -> f64 {
    let a = nalgebra::Point3::new(a.x, a.y, a.z);
    let b = nalgebra::Point3::new(b.x, b.y, b.z);
    nalgebra::distance(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Location::new(0.0, 0.0, 0.0);
        let b = Location::new(3.0, 4.0, 0.0);
        assert!((distance(&a, &b) - 5.0).abs() < 1e-12);
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_total_ticks() {
        let plan = RoutePlan {
            start: 0,
            end: 1,
            length_m: 10.0,
            legs: vec![
                RouteLeg::new(RoadOption::LaneFollow, 30),
                RouteLeg::new(RoadOption::Left, 12),
            ],
        };
        assert_eq!(plan.total_ticks(), 42);
    }
}
