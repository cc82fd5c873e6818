//! 前视相机模拟
//!
//! 按 tick 合成 BGRA 帧，经过传感器延迟后写入单槽锁存器 (latch)。
//! 锁存器只保留最新一帧，消费方每个 tick 取走一次。

use std::collections::VecDeque;

use bytes::Bytes;
use contracts::{CameraConfig, ImageData, ImageFormat};
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

/// 合成一帧所需的场景参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scene {
    /// 整体亮度 (0..=255)，0 表示传感器全黑
    pub brightness: u8,
    /// 车道线水平偏移 (-1.0 左 .. 1.0 右)
    pub lane_offset: f32,
    /// 纹理相位，使相邻帧不完全相同
    pub phase: u64,
}

/// Simulated RGB camera
pub struct CameraSensor {
    width: u32,
    height: u32,
    delay_ticks: u64,
    in_flight: VecDeque<(u64, ImageData)>,
    latch: HeapRb<ImageData>,
}

impl CameraSensor {
    pub fn new(config: &CameraConfig, delay_ticks: u64) -> Self {
        Self {
            width: config.width,
            height: config.height,
            delay_ticks,
            in_flight: VecDeque::new(),
            latch: HeapRb::new(1),
        }
    }

    /// Capture a frame at `tick`; it becomes visible `delay_ticks` later.
    pub fn capture(&mut self, tick: u64, scene: Scene) {
        let frame = render_bgra(self.width, self.height, scene);
        self.in_flight.push_back((tick + self.delay_ticks, frame));
    }

    /// Move every frame due at `tick` into the latch, newest wins.
    pub fn deliver(&mut self, tick: u64) {
        while let Some((due, _)) = self.in_flight.front() {
            if *due > tick {
                break;
            }
            if let Some((_, frame)) = self.in_flight.pop_front() {
                self.latch.push_overwrite(frame);
            }
        }
    }

    /// Take the latched frame, if any arrived since the last call.
    pub fn take(&mut self) -> Option<ImageData> {
        self.latch.try_pop()
    }

    pub fn has_pending(&self) -> bool {
        !self.in_flight.is_empty() || !self.latch.is_empty()
    }
}

/// 渲染 BGRA 帧：上半部分天空，下半部分路面，中间一条车道线
pub fn render_bgra(width: u32, height: u32, scene: Scene) -> ImageData {
    let (w, h) = (width as usize, height as usize);
    let mut data = Vec::with_capacity(w * h * 4);
    let horizon = h / 2;
    let lane_x = ((w as f32 / 2.0) * (1.0 + scene.lane_offset.clamp(-1.0, 1.0))) as usize;
    let base = u16::from(scene.brightness);

    for y in 0..h {
        for x in 0..w {
            let (b, g, r) = if scene.brightness == 0 {
                (0, 0, 0)
            } else if y < horizon {
                // 天空
                (scale(base, 230), scale(base, 190), scale(base, 150))
            } else if x.abs_diff(lane_x) <= 1 {
                // 车道线
                (scale(base, 250), scale(base, 250), scale(base, 250))
            } else {
                let grain = ((x as u64 + y as u64 + scene.phase) % 7) as u16;
                let road = scale(base, 110 + grain * 4);
                (road, road, road)
            };
            data.extend_from_slice(&[b, g, r, 255]);
        }
    }

    ImageData {
        width,
        height,
        format: ImageFormat::Bgra8,
        data: Bytes::from(data),
    }
}

fn scale(brightness: u16, level: u16) -> u8 {
    (brightness * level / 255).min(255) as u8
}
