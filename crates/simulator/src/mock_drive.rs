//! MockDrive - 脚本化路线上的 ego 车辆
//!
//! 实现 `FrameSource`：每次 `tick()` 推进一步，沿路线分段 (RouteLeg)
//! 给出导航指令、控制量与速度，并通过 [`CameraSensor`] 产出带延迟的相机帧。
//! 路线走完后 `is_route_completed()` 为真，指令变为 `Void`，车辆停下。

use std::collections::BTreeSet;
use std::time::Duration;

use contracts::{
    CameraConfig, ContractError, FrameSource, ImageData, RoadOption, Vector3, VehicleControl,
};
use tracing::{debug, trace};

use crate::camera::{CameraSensor, Scene};
use crate::client::RouteLeg;

/// Mock drive configuration (failure and anomaly injection)
#[derive(Debug, Clone)]
pub struct MockDriveConfig {
    /// 相机帧延迟 (tick)
    pub sensor_delay_ticks: u64,
    /// 巡航速度 (km/h)
    pub target_speed_kmh: f64,
    /// 正常帧亮度
    pub brightness: u8,
    /// 这些 tick 捕获的帧全黑
    pub dark_ticks: BTreeSet<u64>,
    /// 这些 tick 速度读数异常 (`spike_speed_kmh`)
    pub speed_spikes: BTreeSet<u64>,
    pub spike_speed_kmh: f64,
    /// false 时 `navigation_command()` 返回 None
    pub planner_attached: bool,
    /// 在该 tick 上返回连接错误
    pub fail_at_tick: Option<u64>,
    /// 每 tick 真实等待时间，None 表示尽快推进
    pub tick_interval: Option<Duration>,
    /// 第一个仿真帧号
    pub first_frame: u64,
}

impl Default for MockDriveConfig {
    fn default() -> Self {
        Self {
            sensor_delay_ticks: 1,
            target_speed_kmh: 30.0,
            brightness: 200,
            dark_ticks: BTreeSet::new(),
            speed_spikes: BTreeSet::new(),
            spike_speed_kmh: 200.0,
            planner_attached: true,
            fail_at_tick: None,
            tick_interval: None,
            first_frame: 1000,
        }
    }
}

/// Scripted ego vehicle implementing [`FrameSource`]
pub struct MockDrive {
    actor_id: u32,
    config: MockDriveConfig,
    legs: Vec<RouteLeg>,
    route_ticks: u64,
    camera: CameraSensor,
    tick: u64,
    frame: u64,
    latest: Option<ImageData>,
    velocity: Vector3,
    control: VehicleControl,
    option: RoadOption,
    completed: bool,
}

impl MockDrive {
    pub fn new(legs: Vec<RouteLeg>, camera: &CameraConfig, config: MockDriveConfig) -> Self {
        let route_ticks = legs.iter().map(|leg| leg.ticks).sum();
        let option = legs.first().map_or(RoadOption::Void, |leg| leg.option);
        let camera = CameraSensor::new(camera, config.sensor_delay_ticks);
        let frame = config.first_frame;
        Self {
            actor_id: 0,
            config,
            completed: route_ticks == 0,
            legs,
            route_ticks,
            camera,
            tick: 0,
            frame,
            latest: None,
            velocity: Vector3::default(),
            control: VehicleControl::default(),
            option,
        }
    }

    /// Drive with default camera and behaviour.
    pub fn with_legs(legs: Vec<RouteLeg>) -> Self {
        Self::new(legs, &CameraConfig::default(), MockDriveConfig::default())
    }

    pub fn with_actor_id(mut self, actor_id: u32) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn actor_id(&self) -> u32 {
        self.actor_id
    }

    /// Ticks advanced so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn route_ticks(&self) -> u64 {
        self.route_ticks
    }

    /// Road option for route position `tick` (1-based), None past the end.
    fn option_at(&self, tick: u64) -> Option<RoadOption> {
        let mut end = 0;
        for leg in &self.legs {
            end += leg.ticks;
            if tick <= end {
                return Some(leg.option);
            }
        }
        None
    }

    fn steer_for(option: RoadOption) -> f32 {
        match option {
            RoadOption::Left => -0.35,
            RoadOption::Right => 0.35,
            RoadOption::ChangeLaneLeft => -0.1,
            RoadOption::ChangeLaneRight => 0.1,
            RoadOption::LaneFollow | RoadOption::Straight | RoadOption::Void => 0.0,
        }
    }

    /// 起步加速：约 1 秒 (20 tick) 达到巡航速度
    fn cruise_speed_kmh(&self) -> f64 {
        let ramp = (self.tick as f64 / 20.0).min(1.0);
        self.config.target_speed_kmh * ramp
    }
}

impl FrameSource for MockDrive {
    async fn tick(&mut self) -> Result<u64, ContractError> {
        if self.config.fail_at_tick == Some(self.tick + 1) {
            return Err(ContractError::simulator_connection(format!(
                "connection lost at tick {}",
                self.tick + 1
            )));
        }
        if let Some(interval) = self.config.tick_interval {
            tokio::time::sleep(interval).await;
        }

        self.tick += 1;
        self.frame += 1;

        match self.option_at(self.tick) {
            Some(option) if !self.completed => {
                if option != self.option {
                    debug!(tick = self.tick, from = ?self.option, to = ?option, "Road option changed");
                }
                self.option = option;
                let speed_kmh = if self.config.speed_spikes.contains(&self.tick) {
                    self.config.spike_speed_kmh
                } else {
                    self.cruise_speed_kmh()
                };
                self.velocity = Vector3::new(speed_kmh / 3.6, 0.0, 0.0);
                self.control = VehicleControl {
                    steer: Self::steer_for(option),
                    throttle: if speed_kmh < self.config.target_speed_kmh { 0.7 } else { 0.4 },
                    brake: 0.0,
                };
            }
            _ => {
                if !self.completed {
                    debug!(tick = self.tick, "Route completed");
                }
                self.completed = true;
                self.option = RoadOption::Void;
                self.velocity = Vector3::default();
                self.control = VehicleControl {
                    steer: 0.0,
                    throttle: 0.0,
                    brake: 1.0,
                };
            }
        }

        let brightness = if self.config.dark_ticks.contains(&self.tick) {
            0
        } else {
            self.config.brightness
        };
        self.camera.capture(
            self.tick,
            Scene {
                brightness,
                lane_offset: self.control.steer,
                phase: self.tick,
            },
        );
        self.camera.deliver(self.tick);
        if let Some(frame) = self.camera.take() {
            self.latest = Some(frame);
        }

        trace!(tick = self.tick, frame = self.frame, option = ?self.option, "Mock tick");
        Ok(self.frame)
    }

    fn latest_frame(&self) -> Option<ImageData> {
        self.latest.clone()
    }

    fn vehicle_velocity(&self) -> Vector3 {
        self.velocity
    }

    fn vehicle_control(&self) -> VehicleControl {
        self.control
    }

    fn navigation_command(&self) -> Option<RoadOption> {
        self.config.planner_attached.then_some(self.option)
    }

    fn is_route_completed(&self) -> bool {
        self.completed
    }
}
