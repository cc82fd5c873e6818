//! Sample - 单帧带标签观测
//!
//! 一个仿真 tick 产生一个 Sample：88x200 RGB 图像 + 25 维控制向量。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ContractError, NavigationCommand};

/// 图像高度 (像素)
pub const IMAGE_HEIGHT: usize = 88;

/// 图像宽度 (像素)
pub const IMAGE_WIDTH: usize = 200;

/// 通道数 (RGB)
pub const IMAGE_CHANNELS: usize = 3;

/// 单帧 RGB 字节数
pub const IMAGE_BYTES: usize = IMAGE_HEIGHT * IMAGE_WIDTH * IMAGE_CHANNELS;

/// 控制向量长度
pub const CONTROL_VECTOR_LEN: usize = 25;

/// 图像数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素格式
    pub format: ImageFormat,

    /// 原始像素数据
    pub data: Bytes,
}

/// 图像格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Rgb8,
    Bgra8,
}

impl ImageFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ImageFormat::Rgb8 => 3,
            ImageFormat::Bgra8 => 4,
        }
    }
}

impl ImageData {
    /// Convert to packed RGB8.
    ///
    /// Camera frames arrive as BGRA; alpha is dropped and the colour
    /// channels reordered.
    pub fn to_rgb8(&self) -> Result<ImageData, ContractError> {
        let pixels = self.width as usize * self.height as usize;
        let expected = pixels * self.format.bytes_per_pixel();
        if self.data.len() != expected {
            return Err(ContractError::invalid_frame(format!(
                "{}x{} {:?} frame needs {} bytes, got {}",
                self.width,
                self.height,
                self.format,
                expected,
                self.data.len()
            )));
        }

        let data = match self.format {
            ImageFormat::Rgb8 => self.data.clone(),
            ImageFormat::Bgra8 => {
                let mut rgb = Vec::with_capacity(pixels * 3);
                for px in self.data.chunks_exact(4) {
                    rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                }
                Bytes::from(rgb)
            }
        };

        Ok(ImageData {
            width: self.width,
            height: self.height,
            format: ImageFormat::Rgb8,
            data,
        })
    }
}

/// 3D 向量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// 车辆控制量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleControl {
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
}

/// 25 维控制/标签向量
///
/// 只有 steer/throttle/brake/speed/command 五个槽位有值，其余保留为 0。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlVector([f32; CONTROL_VECTOR_LEN]);

impl ControlVector {
    pub const STEER: usize = 0;
    pub const THROTTLE: usize = 1;
    pub const BRAKE: usize = 2;
    pub const SPEED: usize = 10;
    pub const COMMAND: usize = 24;

    pub fn new(control: VehicleControl, speed_kmh: f32, command: NavigationCommand) -> Self {
        let mut values = [0.0f32; CONTROL_VECTOR_LEN];
        values[Self::STEER] = control.steer;
        values[Self::THROTTLE] = control.throttle;
        values[Self::BRAKE] = control.brake;
        values[Self::SPEED] = speed_kmh;
        values[Self::COMMAND] = f32::from(command.code());
        Self(values)
    }

    pub const fn from_array(values: [f32; CONTROL_VECTOR_LEN]) -> Self {
        Self(values)
    }

    pub fn steer(&self) -> f32 {
        self.0[Self::STEER]
    }

    pub fn throttle(&self) -> f32 {
        self.0[Self::THROTTLE]
    }

    pub fn brake(&self) -> f32 {
        self.0[Self::BRAKE]
    }

    pub fn speed_kmh(&self) -> f32 {
        self.0[Self::SPEED]
    }

    pub fn command(&self) -> NavigationCommand {
        NavigationCommand::from_code(self.0[Self::COMMAND].round() as i32)
    }

    pub fn as_array(&self) -> &[f32; CONTROL_VECTOR_LEN] {
        &self.0
    }
}

impl Default for ControlVector {
    fn default() -> Self {
        Self([0.0; CONTROL_VECTOR_LEN])
    }
}

/// 单帧样本
///
/// 创建后不可变，图像固定为 88x200x3 RGB8。
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    rgb: Bytes,
    targets: ControlVector,
}

impl Sample {
    /// Build a sample from a packed RGB8 buffer of exactly 88x200x3 bytes.
    pub fn new(rgb: Bytes, targets: ControlVector) -> Result<Self, ContractError> {
        if rgb.len() != IMAGE_BYTES {
            return Err(ContractError::invalid_frame(format!(
                "sample image must be {IMAGE_HEIGHT}x{IMAGE_WIDTH}x{IMAGE_CHANNELS} ({IMAGE_BYTES} bytes), got {} bytes",
                rgb.len()
            )));
        }
        Ok(Self { rgb, targets })
    }

    /// Build a sample from a camera frame, converting to RGB8 if needed.
    pub fn from_frame(frame: &ImageData, targets: ControlVector) -> Result<Self, ContractError> {
        if frame.width as usize != IMAGE_WIDTH || frame.height as usize != IMAGE_HEIGHT {
            return Err(ContractError::invalid_frame(format!(
                "expected {IMAGE_WIDTH}x{IMAGE_HEIGHT} frame, got {}x{}",
                frame.width, frame.height
            )));
        }
        let rgb = frame.to_rgb8()?;
        Self::new(rgb.data, targets)
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    pub fn targets(&self) -> &ControlVector {
        &self.targets
    }

    /// Per-tick command label (index 24).
    pub fn command(&self) -> NavigationCommand {
        self.targets.command()
    }

    /// Mean pixel intensity over all channels.
    pub fn mean_brightness(&self) -> f64 {
        mean_intensity(&self.rgb)
    }
}

/// Mean intensity of a raw u8 buffer (0 for an empty buffer).
pub fn mean_intensity(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: u64 = data.iter().map(|&b| u64::from(b)).sum();
    sum as f64 / data.len() as f64
}

/// 样本被质量过滤器拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleRejection {
    /// 图像过暗 (传感器异常)
    TooDark { brightness: f64 },
    /// 速度不合理
    ImplausibleSpeed { speed_kmh: f64 },
}

impl std::fmt::Display for SampleRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleRejection::TooDark { brightness } => {
                write!(f, "image too dark (mean brightness {brightness:.2})")
            }
            SampleRejection::ImplausibleSpeed { speed_kmh } => {
                write!(f, "implausible speed {speed_kmh:.1} km/h")
            }
        }
    }
}
