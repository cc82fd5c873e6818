//! 样本质量过滤
//!
//! 丢弃传感器异常 (图像过暗) 或物理上不可能 (速度过高) 的样本。
//! 被拒绝的样本仍然消耗一个 tick。

use contracts::{QualityConfig, Sample, SampleRejection};

/// Per-sample validity check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityFilter {
    min_brightness: f64,
    max_speed_kmh: f64,
}

impl QualityFilter {
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            min_brightness: config.min_brightness,
            max_speed_kmh: config.max_speed_kmh,
        }
    }

    /// Check raw readings; `None` means the sample is kept.
    pub fn check(&self, brightness: f64, speed_kmh: f64) -> Option<SampleRejection> {
        if brightness < self.min_brightness {
            Some(SampleRejection::TooDark { brightness })
        } else if speed_kmh > self.max_speed_kmh {
            Some(SampleRejection::ImplausibleSpeed { speed_kmh })
        } else {
            None
        }
    }

    pub fn inspect(&self, sample: &Sample) -> Option<SampleRejection> {
        self.check(
            sample.mean_brightness(),
            f64::from(sample.targets().speed_kmh()),
        )
    }
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(&QualityConfig::default())
    }
}

/// Metric label for a rejection
pub fn rejection_label(rejection: &SampleRejection) -> &'static str {
    match rejection {
        SampleRejection::TooDark { .. } => "too_dark",
        SampleRejection::ImplausibleSpeed { .. } => "implausible_speed",
    }
}
