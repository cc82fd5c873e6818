//! CollectorBlueprint - Config Loader 输出
//!
//! 描述一次采集会话的完整配置：仿真器连接、车辆、相机、采集策略、
//! 指令映射、输出格式、全自动路线策略。
//!
//! 所有字段都有默认值，空配置文件即可运行。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{CommandMapping, IMAGE_HEIGHT, IMAGE_WIDTH};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CollectorBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 仿真器连接
    #[serde(default)]
    #[validate(nested)]
    pub simulator: SimulatorConfig,

    /// 自车配置
    #[serde(default)]
    #[validate(nested)]
    pub vehicle: VehicleConfig,

    /// 前视相机
    #[serde(default)]
    #[validate(nested)]
    pub camera: CameraConfig,

    /// 采集策略
    #[serde(default)]
    #[validate(nested)]
    pub collection: CollectionConfig,

    /// RoadOption -> 指令映射
    #[serde(default)]
    pub commands: CommandMapping,

    /// 输出配置
    #[serde(default)]
    #[validate(nested)]
    pub output: OutputConfig,

    /// 全自动采集
    #[serde(default)]
    #[validate(nested)]
    pub auto: AutoConfig,
}

/// 仿真器连接配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulatorConfig {
    /// 服务器地址
    #[serde(default = "default_host")]
    #[validate(length(min = 1, message = "host must not be empty"))]
    pub host: String,

    /// 服务器端口
    #[serde(default = "default_port")]
    #[validate(range(min = 1, message = "port must be non-zero"))]
    pub port: u16,

    /// 地图名称 (e.g., "Town01")
    #[serde(default = "default_map")]
    #[validate(length(min = 1, message = "map must not be empty"))]
    pub map: String,

    /// 同步模式步长 (秒)
    #[serde(default = "default_fixed_delta")]
    #[validate(range(exclusive_min = 0.0, max = 1.0, message = "must be in (0, 1]"))]
    pub fixed_delta_seconds: f64,

    /// 连接超时 (秒)
    #[serde(default = "default_connect_timeout")]
    #[validate(range(min = 1, message = "must be at least 1 second"))]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    2000
}

fn default_map() -> String {
    "Town01".to_string()
}

fn default_fixed_delta() -> f64 {
    0.05 // 20 FPS
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            map: default_map(),
            fixed_delta_seconds: default_fixed_delta(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// 自车配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VehicleConfig {
    /// 蓝图名称
    #[serde(default = "default_vehicle_blueprint")]
    #[validate(length(min = 1, message = "blueprint must not be empty"))]
    pub blueprint: String,

    /// 起点 spawn point 索引
    #[serde(default)]
    pub spawn_index: usize,

    /// 终点 spawn point 索引
    #[serde(default = "default_destination_index")]
    pub destination_index: usize,

    /// 巡航速度 (km/h)
    #[serde(default = "default_target_speed")]
    #[validate(range(exclusive_min = 0.0, max = 150.0, message = "must be in (0, 150]"))]
    pub target_speed_kmh: f64,

    /// 忽略红绿灯
    #[serde(default = "default_true")]
    pub ignore_traffic_lights: bool,

    /// 忽略停车标志
    #[serde(default = "default_true")]
    pub ignore_signs: bool,

    /// 忽略其他车辆的百分比 (0-100)
    #[serde(default = "default_ignore_vehicles")]
    #[validate(range(max = 100, message = "must be a percentage (0-100)"))]
    pub ignore_vehicles_percentage: u8,
}

fn default_vehicle_blueprint() -> String {
    "vehicle.tesla.model3".to_string()
}

fn default_destination_index() -> usize {
    1
}

fn default_target_speed() -> f64 {
    30.0
}

fn default_true() -> bool {
    true
}

fn default_ignore_vehicles() -> u8 {
    80
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            blueprint: default_vehicle_blueprint(),
            spawn_index: 0,
            destination_index: default_destination_index(),
            target_speed_kmh: default_target_speed(),
            ignore_traffic_lights: true,
            ignore_signs: true,
            ignore_vehicles_percentage: default_ignore_vehicles(),
        }
    }
}

/// 3D 变换：位置 + 旋转
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 位置 (x, y, z) 单位：米
    pub location: Location,

    /// 旋转 (pitch, yaw, roll) 单位：度
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// 前视相机配置
///
/// 图像尺寸由数据格式固定为 200x88。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CameraConfig {
    #[serde(default = "default_camera_width")]
    pub width: u32,

    #[serde(default = "default_camera_height")]
    pub height: u32,

    /// 视场角 (度)
    #[serde(default = "default_fov")]
    #[validate(range(exclusive_min = 0.0, exclusive_max = 180.0, message = "must be in (0, 180)"))]
    pub fov: f64,

    /// 相对车辆的挂载位姿
    #[serde(default = "default_camera_mount")]
    pub mount: Transform,
}

fn default_camera_width() -> u32 {
    IMAGE_WIDTH as u32
}

fn default_camera_height() -> u32 {
    IMAGE_HEIGHT as u32
}

fn default_fov() -> f64 {
    90.0
}

fn default_camera_mount() -> Transform {
    Transform {
        location: Location::new(2.0, 0.0, 1.4),
        rotation: Rotation::default(),
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_camera_width(),
            height: default_camera_height(),
            fov: default_fov(),
            mount: default_camera_mount(),
        }
    }
}

/// 采集策略
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CollectionConfig {
    /// 会话帧预算 (采集 + 跳过)
    #[serde(default = "default_max_frames")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub max_frames: u64,

    /// 单段最大样本数
    #[serde(default = "default_segment_size")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub segment_size: usize,

    /// 跳过状态最多持续的 tick 数
    #[serde(default = "default_skip_timeout")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub skip_timeout_ticks: u64,

    /// 首帧到达后的预热 tick 数
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: u64,

    /// 等待首帧的最大 tick 数
    #[serde(default = "default_first_frame_timeout")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub first_frame_timeout_ticks: u64,

    /// 进度日志间隔 (样本/tick)
    #[serde(default = "default_progress_interval")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub progress_interval: u64,

    /// 质量过滤
    #[serde(default)]
    #[validate(nested)]
    pub quality: QualityConfig,
}

fn default_max_frames() -> u64 {
    50_000
}

fn default_segment_size() -> usize {
    200
}

fn default_skip_timeout() -> u64 {
    500
}

fn default_warmup_ticks() -> u64 {
    10
}

fn default_first_frame_timeout() -> u64 {
    200
}

fn default_progress_interval() -> u64 {
    50
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_frames: default_max_frames(),
            segment_size: default_segment_size(),
            skip_timeout_ticks: default_skip_timeout(),
            warmup_ticks: default_warmup_ticks(),
            first_frame_timeout_ticks: default_first_frame_timeout(),
            progress_interval: default_progress_interval(),
            quality: QualityConfig::default(),
        }
    }
}

/// 质量过滤阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct QualityConfig {
    /// 图像平均亮度下限
    #[serde(default = "default_min_brightness")]
    #[validate(range(min = 0.0, max = 255.0, message = "must be in [0, 255]"))]
    pub min_brightness: f64,

    /// 速度上限 (km/h)
    #[serde(default = "default_max_speed")]
    #[validate(range(exclusive_min = 0.0, message = "must be positive"))]
    pub max_speed_kmh: f64,
}

fn default_min_brightness() -> f64 {
    5.0
}

fn default_max_speed() -> f64 {
    150.0
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_brightness: default_min_brightness(),
            max_speed_kmh: default_max_speed(),
        }
    }
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OutputConfig {
    /// 数据保存目录
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,

    /// 容器格式
    #[serde(default)]
    pub container: ContainerFormat,

    /// 压缩级别 (0-9)
    #[serde(default = "default_compression_level")]
    #[validate(range(max = 9, message = "must be in [0, 9]"))]
    pub compression_level: u8,

    /// 单文件最大样本数
    #[serde(default = "default_chunk_size")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub chunk_size: usize,

    /// 文件名分片后缀策略
    #[serde(default)]
    pub part_suffix: PartSuffix,
}

fn default_save_path() -> PathBuf {
    PathBuf::from("./carla_data")
}

fn default_compression_level() -> u8 {
    4
}

fn default_chunk_size() -> usize {
    200
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            container: ContainerFormat::default(),
            compression_level: default_compression_level(),
            chunk_size: default_chunk_size(),
            part_suffix: PartSuffix::default(),
        }
    }
}

/// 容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    /// zip + .npy，纯 Rust 实现
    #[default]
    Npz,
    /// HDF5 (需要 `hdf5` feature)
    Hdf5,
}

impl ContainerFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Npz => "npz",
            ContainerFormat::Hdf5 => "h5",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "npz" => Some(ContainerFormat::Npz),
            "h5" | "hdf5" => Some(ContainerFormat::Hdf5),
            _ => None,
        }
    }
}

/// 文件名何时带 `_partNNN` 后缀
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartSuffix {
    /// 仅当分段超过 chunk_size 被切分时
    #[default]
    WhenSplit,
    /// 总是带后缀
    Always,
}

/// 全自动采集配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AutoConfig {
    /// 路线对生成策略
    #[serde(default)]
    pub strategy: RouteStrategy,

    /// 路线最短直线距离 (米)
    #[serde(default = "default_min_distance")]
    #[validate(range(min = 0.0, message = "must be non-negative"))]
    pub min_distance_m: f64,

    /// 路线最长直线距离 (米)
    #[serde(default = "default_max_distance")]
    #[validate(range(exclusive_min = 0.0, message = "must be positive"))]
    pub max_distance_m: f64,

    /// 每条路线采集帧数
    #[serde(default = "default_frames_per_route")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub frames_per_route: u64,

    /// 最多尝试的路线数
    #[serde(default)]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub max_routes: Option<usize>,
}

fn default_min_distance() -> f64 {
    50.0
}

fn default_max_distance() -> f64 {
    500.0
}

fn default_frames_per_route() -> u64 {
    1000
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            strategy: RouteStrategy::default(),
            min_distance_m: default_min_distance(),
            max_distance_m: default_max_distance(),
            frames_per_route: default_frames_per_route(),
            max_routes: None,
        }
    }
}

/// 路线对生成策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    /// 每个起点取最短/中位/最长三个终点
    #[default]
    Smart,
    /// 所有距离合规的有序点对
    Exhaustive,
}
