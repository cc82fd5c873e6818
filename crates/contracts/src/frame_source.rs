//! FrameSource trait - 仿真世界的每 tick 视图
//!
//! `tick()` 是整个采集流程中唯一的挂起点：推进仿真一步并等待新帧。
//! 其余方法只读取最近一次 tick 之后的状态，不会阻塞。

use crate::{ContractError, ImageData, RoadOption, Vector3, VehicleControl};

/// Per-tick view of the simulated world
#[trait_variant::make(FrameSource: Send)]
pub trait LocalFrameSource {
    /// Advance the simulation by exactly one step.
    ///
    /// Returns the simulator frame number of the new step.
    async fn tick(&mut self) -> Result<u64, ContractError>;

    /// Most recent camera frame, `None` until the sensor has produced one.
    fn latest_frame(&self) -> Option<ImageData>;

    /// Ego vehicle velocity in m/s (world frame).
    fn vehicle_velocity(&self) -> Vector3;

    /// Control applied to the ego vehicle on the last step.
    fn vehicle_control(&self) -> VehicleControl;

    /// Planner's current road option, `None` when no planner is attached.
    fn navigation_command(&self) -> Option<RoadOption>;

    /// Whether the agent has finished its route.
    fn is_route_completed(&self) -> bool;
}
