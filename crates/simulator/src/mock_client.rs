//! Mock 仿真客户端
//!
//! 在规则网格地图上模拟 spawn 点、全局规划器和 ego 车辆，
//! 支持注入连接失败、不可达路线与 spawn 失败。

use std::collections::HashSet;

use contracts::{CameraConfig, Location, RoadOption, SimulatorConfig, VehicleConfig};
use tracing::{debug, info, instrument};

use crate::client::{RouteLeg, RoutePlan, SimulatorClient};
use crate::error::{Result, SimulatorError};
use crate::mock_drive::{MockDrive, MockDriveConfig};

/// 路口直行段长度 (m)
const INTERSECTION_M: f64 = 10.0;
/// 转弯段长度 (m)
const TURN_M: f64 = 15.0;
/// 变道段长度 (m)
const LANE_CHANGE_M: f64 = 8.0;

/// Mock 客户端配置
#[derive(Debug, Clone)]
pub struct MockSimulatorConfig {
    /// 网格行列数 (未提供 `spawn_points` 时使用)
    pub grid_rows: usize,
    pub grid_cols: usize,
    /// 街区边长 (m)
    pub block_m: f64,
    /// 自定义 spawn 点，覆盖网格
    pub spawn_points: Option<Vec<Location>>,
    /// connect 直接失败
    pub fail_connect: bool,
    /// 规划器无法连通的 (start, end)
    pub unreachable: Vec<(usize, usize)>,
    /// 在这些 spawn 点生成车辆会失败
    pub fail_spawn: Vec<usize>,
    /// 生成的 MockDrive 使用的行为配置
    pub drive: MockDriveConfig,
}

impl Default for MockSimulatorConfig {
    fn default() -> Self {
        Self {
            grid_rows: 6,
            grid_cols: 6,
            block_m: 80.0,
            spawn_points: None,
            fail_connect: false,
            unreachable: Vec::new(),
            fail_spawn: Vec::new(),
            drive: MockDriveConfig::default(),
        }
    }
}

/// Mock simulator client
pub struct MockSimulatorClient {
    config: MockSimulatorConfig,
    spawn_points: Vec<Location>,
    connected: bool,
    fixed_delta_seconds: f64,
    next_actor_id: u32,
    actors: HashSet<u32>,
}

impl MockSimulatorClient {
    pub fn new() -> Self {
        Self::with_config(MockSimulatorConfig::default())
    }

    pub fn with_config(config: MockSimulatorConfig) -> Self {
        let spawn_points = config
            .spawn_points
            .clone()
            .unwrap_or_else(|| grid_points(config.grid_rows, config.grid_cols, config.block_m));
        Self {
            config,
            spawn_points,
            connected: false,
            fixed_delta_seconds: 0.05,
            next_actor_id: 1000,
            actors: HashSet::new(),
        }
    }

    /// 当前存活的 ego 车辆数量
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(SimulatorError::NotConnected)
        }
    }

    fn point(&self, index: usize) -> Result<Location> {
        self.spawn_points
            .get(index)
            .copied()
            .ok_or(SimulatorError::SpawnPointOutOfRange {
                index,
                available: self.spawn_points.len(),
            })
    }

    /// 沿网格道路规划：先走 x 方向，转弯，再走 y 方向
    fn plan_route(&self, start: usize, end: usize, speed_kmh: f64) -> Result<RoutePlan> {
        self.ensure_connected()?;
        let a = self.point(start)?;
        let b = self.point(end)?;
        if start == end {
            return Err(SimulatorError::route_unreachable(start, end, "start equals destination"));
        }
        if self.config.unreachable.contains(&(start, end)) {
            return Err(SimulatorError::route_unreachable(start, end, "no connecting lane"));
        }

        let metres_per_tick = (speed_kmh / 3.6 * self.fixed_delta_seconds).max(1e-3);
        let ticks = |m: f64| ((m / metres_per_tick).round() as u64).max(1);
        let (dx, dy) = (b.x - a.x, b.y - a.y);

        let mut legs = Vec::new();
        if (start + end) % 2 == 0 && dx.abs() >= 2.0 * self.config.block_m {
            push_leg(&mut legs, RoadOption::ChangeLaneLeft, ticks(LANE_CHANGE_M));
        }
        self.push_stretch(&mut legs, dx.abs(), &ticks);
        if dx != 0.0 && dy != 0.0 {
            let turn = if dx.signum() * dy.signum() > 0.0 {
                RoadOption::Left
            } else {
                RoadOption::Right
            };
            push_leg(&mut legs, turn, ticks(TURN_M));
        }
        self.push_stretch(&mut legs, dy.abs(), &ticks);

        Ok(RoutePlan {
            start,
            end,
            length_m: dx.abs() + dy.abs(),
            legs,
        })
    }

    /// 一段直路：每经过一个路口插入一段直行
    fn push_stretch(&self, legs: &mut Vec<RouteLeg>, length_m: f64, ticks: &impl Fn(f64) -> u64) {
        if length_m <= 0.0 {
            return;
        }
        let blocks = (length_m / self.config.block_m).round().max(1.0) as usize;
        let block_len = length_m / blocks as f64;
        for i in 0..blocks {
            if i > 0 {
                push_leg(legs, RoadOption::Straight, ticks(INTERSECTION_M));
            }
            push_leg(legs, RoadOption::LaneFollow, ticks(block_len));
        }
    }
}

impl Default for MockSimulatorClient {
    fn default() -> Self {
        Self::new()
    }
}

/// 相同选项的相邻段合并
fn push_leg(legs: &mut Vec<RouteLeg>, option: RoadOption, ticks: u64) {
    match legs.last_mut() {
        Some(last) if last.option == option => last.ticks += ticks,
        _ => legs.push(RouteLeg::new(option, ticks)),
    }
}

fn grid_points(rows: usize, cols: usize, block_m: f64) -> Vec<Location> {
    (0..rows)
        .flat_map(|r| (0..cols).map(move |c| Location::new(c as f64 * block_m, r as f64 * block_m, 0.3)))
        .collect()
}

impl SimulatorClient for MockSimulatorClient {
    type Drive = MockDrive;

    #[instrument(
        name = "mock_simulator_connect",
        skip(self, config),
        fields(host = %config.host, port = config.port, map = %config.map)
    )]
    async fn connect(&mut self, config: &SimulatorConfig) -> Result<()> {
        if self.config.fail_connect {
            return Err(SimulatorError::ConnectionFailed {
                host: config.host.clone(),
                port: config.port,
                message: "mock failure".into(),
            });
        }
        self.fixed_delta_seconds = config.fixed_delta_seconds;
        self.connected = true;
        info!(spawn_points = self.spawn_points.len(), "Connected to mock simulator");
        Ok(())
    }

    fn spawn_points(&self) -> Result<Vec<Location>> {
        self.ensure_connected()?;
        Ok(self.spawn_points.clone())
    }

    #[instrument(name = "mock_simulator_trace_route", skip(self))]
    async fn trace_route(&self, start: usize, end: usize) -> Result<RoutePlan> {
        self.plan_route(start, end, self.config.drive.target_speed_kmh)
    }

    #[instrument(
        name = "mock_simulator_spawn_ego",
        skip(self, vehicle, camera),
        fields(blueprint = %vehicle.blueprint, start, end)
    )]
    async fn spawn_ego(
        &mut self,
        vehicle: &VehicleConfig,
        camera: &CameraConfig,
        start: usize,
        end: usize,
    ) -> Result<MockDrive> {
        self.ensure_connected()?;
        self.point(start)?;
        if self.config.fail_spawn.contains(&start) {
            return Err(SimulatorError::VehicleSpawnFailed {
                blueprint: vehicle.blueprint.clone(),
                index: start,
                message: "mock failure".into(),
            });
        }

        let plan = self.plan_route(start, end, vehicle.target_speed_kmh)?;
        let actor_id = self.next_actor_id;
        self.next_actor_id += 1;
        self.actors.insert(actor_id);

        debug!(
            actor_id,
            length_m = plan.length_m,
            legs = plan.legs.len(),
            ticks = plan.total_ticks(),
            "Ego vehicle spawned"
        );

        let drive_config = MockDriveConfig {
            target_speed_kmh: vehicle.target_speed_kmh,
            ..self.config.drive.clone()
        };
        Ok(MockDrive::new(plan.legs, camera, drive_config).with_actor_id(actor_id))
    }

    #[instrument(name = "mock_simulator_teardown", skip(self, drive), fields(actor_id = drive.actor_id()))]
    async fn teardown(&mut self, drive: MockDrive) -> Result<()> {
        // 幂等：重复销毁也返回 Ok
        self.actors.remove(&drive.actor_id());
        Ok(())
    }
}
