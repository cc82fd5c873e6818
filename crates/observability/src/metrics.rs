//! 采集指标模块
//!
//! 状态机与落盘路径在关键节点调用这些函数；未安装 recorder 时为空操作。

use metrics::{counter, gauge, histogram};
use serde::Serialize;

/// 记录一次仿真 tick (按当前状态分类)
pub fn record_tick(state: &'static str) {
    counter!("carla_collect_ticks_total", "state" => state).increment(1);
}

/// 记录一个被接受的样本
pub fn record_sample_collected(command: &'static str) {
    counter!("carla_collect_samples_collected_total", "command" => command).increment(1);
}

/// 记录一个被质量过滤器拒绝的样本
pub fn record_sample_rejected(reason: &'static str) {
    counter!("carla_collect_samples_rejected_total", "reason" => reason).increment(1);
}

/// 记录当前分段缓冲深度
pub fn record_buffer_fill(len: usize) {
    gauge!("carla_collect_segment_buffer_len").set(len as f64);
}

/// 记录一个落盘文件
pub fn record_chunk_written(command: &'static str, samples: usize, bytes: u64) {
    counter!("carla_collect_chunks_written_total", "command" => command).increment(1);
    counter!("carla_collect_samples_saved_total", "command" => command).increment(samples as u64);
    counter!("carla_collect_bytes_written_total").increment(bytes);
    histogram!("carla_collect_chunk_bytes").record(bytes as f64);
}

/// 记录落盘失败
pub fn record_persistence_failure() {
    counter!("carla_collect_persistence_failures_total").increment(1);
}

/// 记录落盘耗时
pub fn record_flush_latency_ms(latency_ms: f64) {
    histogram!("carla_collect_flush_latency_ms").record(latency_ms);
}

/// 记录一次跳过结束 (command_changed / timeout / route_completed / budget)
pub fn record_segment_skipped(outcome: &'static str) {
    counter!("carla_collect_segments_skipped_total", "outcome" => outcome).increment(1);
}

/// 记录状态迁移
pub fn record_state_transition(from: &'static str, to: &'static str) {
    counter!(
        "carla_collect_state_transitions_total",
        "from" => from,
        "to" => to
    )
    .increment(1);
}

/// 记录一条自动路线的结果
pub fn record_route_outcome(completed: bool) {
    let status = if completed { "completed" } else { "failed" };
    counter!("carla_collect_routes_total", "status" => status).increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 合并另一组统计 (Chan et al. parallel update)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let total = self.count + other.count;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * (self.count as f64 * other.count as f64) / total as f64;
        self.mean += delta * other.count as f64 / total as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = total;
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
