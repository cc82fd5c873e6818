//! # Simulator
//!
//! 仿真器访问层：`SimulatorClient` 抽象连接、spawn 点、全局规划与 ego 车辆生命周期；
//! 每辆 ego 车辆以 `FrameSource` 的形式交给采集状态机逐 tick 驱动。
//!
//! 本 crate 提供基于网格地图的 mock 实现，用于无仿真器环境下的运行与测试。

pub mod camera;
pub mod client;
pub mod error;
pub mod mock_client;
pub mod mock_drive;

pub use camera::{render_bgra, CameraSensor, Scene};
pub use client::{distance, RouteLeg, RoutePlan, SimulatorClient};
pub use error::{Result, SimulatorError};
pub use mock_client::{MockSimulatorClient, MockSimulatorConfig};
pub use mock_drive::{MockDrive, MockDriveConfig};
