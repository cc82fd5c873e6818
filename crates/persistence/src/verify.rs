//! 数据验证报告
//!
//! 递归扫描目录中的数据块文件，校验形状不变量并汇总指令分布、
//! 速度与控制量统计。只读，重复运行结果一致。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use contracts::{mean_intensity, ContainerFormat, NavigationCommand};
use observability::{RunningStats, StatsSummary};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::container::{self, LoadedChunk};
use crate::PersistenceError;

/// 报告文件名
pub const REPORT_FILE_NAME: &str = "verification_report.json";

/// 校验阈值
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    /// 少于该样本数的文件记为不完整
    pub expected_chunk_size: usize,
    pub min_brightness: f64,
    pub max_speed_kmh: f64,
    /// steer 合法范围
    pub steer_range: (f32, f32),
    /// throttle / brake 合法范围
    pub pedal_range: (f32, f32),
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            expected_chunk_size: 200,
            min_brightness: 5.0,
            max_speed_kmh: 150.0,
            steer_range: (-1.1, 1.1),
            pedal_range: (-0.1, 1.1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorruptedFile {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteFile {
    pub file: String,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileWarnings {
    pub file: String,
    pub warnings: Vec<String>,
}

/// Aggregated statistics over every chunk under a directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub data_path: PathBuf,
    pub total_files: usize,
    pub valid_files: usize,
    pub total_samples: u64,
    pub total_size_mb: f64,
    pub file_size_mb: StatsSummary,
    /// 指令名 -> 样本数
    pub command_distribution: BTreeMap<String, u64>,
    pub speed_kmh: StatsSummary,
    pub steer: StatsSummary,
    pub throttle: StatsSummary,
    pub brake: StatsSummary,
    pub corrupted_files: Vec<CorruptedFile>,
    pub incomplete_files: Vec<IncompleteFile>,
    pub warning_files: Vec<FileWarnings>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.corrupted_files.is_empty() && self.warning_files.is_empty()
    }

    /// Write the report as pretty JSON into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, PersistenceError> {
        let path = dir.join(REPORT_FILE_NAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PersistenceError::io(&path, std::io::Error::other(e)))?;
        fs::write(&path, json).map_err(|e| PersistenceError::io(&path, e))?;
        Ok(path)
    }

    /// Print a human-readable summary.
    pub fn print_summary(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════╗");
        println!("║                  Verification Summary                    ║");
        println!("╠══════════════════════════════════════════════════════════╣");
        println!("║ Files:       {:>10} total, {:>8} valid              ║", self.total_files, self.valid_files);
        println!("║ Samples:     {:>10}                                  ║", self.total_samples);
        println!("║ Data size:   {:>10.2} MB                               ║", self.total_size_mb);
        println!("║ Corrupted:   {:>10}                                  ║", self.corrupted_files.len());
        println!("║ Incomplete:  {:>10}                                  ║", self.incomplete_files.len());
        println!("║ Warnings:    {:>10}                                  ║", self.warning_files.len());
        println!("╚══════════════════════════════════════════════════════════╝");

        if !self.command_distribution.is_empty() {
            println!("\nCommand distribution:");
            for (name, count) in &self.command_distribution {
                let pct = *count as f64 / self.total_samples.max(1) as f64 * 100.0;
                println!("  {name:<12} {count:>8} ({pct:5.1}%)");
            }
        }

        println!("\nSpeed (km/h):  {}", self.speed_kmh);
        println!("Steer:         {}", self.steer);
        println!("Throttle:      {}", self.throttle);
        println!("Brake:         {}", self.brake);
        println!("File size (MB): {}", self.file_size_mb);

        if !self.corrupted_files.is_empty() {
            println!("\nCorrupted files:");
            for entry in self.corrupted_files.iter().take(10) {
                println!("  ✗ {}: {}", entry.file, entry.error);
            }
            if self.corrupted_files.len() > 10 {
                println!("  ... and {} more", self.corrupted_files.len() - 10);
            }
        }

        if !self.incomplete_files.is_empty() {
            println!("\nIncomplete files:");
            let mut sorted = self.incomplete_files.clone();
            sorted.sort_by_key(|f| f.samples);
            for entry in sorted.iter().take(20) {
                println!("  • {} ({} samples)", entry.file, entry.samples);
            }
            if sorted.len() > 20 {
                println!("  ... and {} more", sorted.len() - 20);
            }
        }

        if !self.warning_files.is_empty() {
            println!("\nWarnings:");
            for entry in self.warning_files.iter().take(10) {
                println!("  ⚠ {}: {}", entry.file, entry.warnings.join("; "));
            }
        }
        println!();
    }
}

/// Accumulator used while scanning
#[derive(Default)]
struct Accumulator {
    total_samples: u64,
    total_bytes: u64,
    file_sizes: RunningStats,
    commands: BTreeMap<i32, u64>,
    speed: RunningStats,
    steer: RunningStats,
    throttle: RunningStats,
    brake: RunningStats,
    corrupted: Vec<CorruptedFile>,
    incomplete: Vec<IncompleteFile>,
    warnings: Vec<FileWarnings>,
}

/// Scan `dir` recursively and build a report.
pub fn verify_directory(
    dir: &Path,
    options: &VerifyOptions,
) -> Result<VerificationReport, PersistenceError> {
    let files = find_chunk_files(dir)?;
    info!(dir = %dir.display(), files = files.len(), "Verifying chunk files");

    let mut acc = Accumulator::default();
    for path in &files {
        let label = relative_label(dir, path);
        match container::read_chunk(path) {
            Ok(chunk) => {
                let bytes = fs::metadata(path)
                    .map(|m| m.len())
                    .map_err(|e| PersistenceError::io(path, e))?;
                inspect_chunk(&chunk, &label, bytes, options, &mut acc);
            }
            Err(e) => {
                warn!(file = %label, error = %e, "Corrupted chunk");
                acc.corrupted.push(CorruptedFile {
                    file: label,
                    error: e.to_string(),
                });
            }
        }
    }

    let command_distribution = acc
        .commands
        .iter()
        .map(|(&code, &count)| (command_label(code), count))
        .collect();

    Ok(VerificationReport {
        data_path: dir.to_path_buf(),
        total_files: files.len(),
        valid_files: files.len() - acc.corrupted.len(),
        total_samples: acc.total_samples,
        total_size_mb: acc.total_bytes as f64 / 1024.0 / 1024.0,
        file_size_mb: StatsSummary::from(&acc.file_sizes),
        command_distribution,
        speed_kmh: StatsSummary::from(&acc.speed),
        steer: StatsSummary::from(&acc.steer),
        throttle: StatsSummary::from(&acc.throttle),
        brake: StatsSummary::from(&acc.brake),
        corrupted_files: acc.corrupted,
        incomplete_files: acc.incomplete,
        warning_files: acc.warnings,
    })
}

fn inspect_chunk(
    chunk: &LoadedChunk,
    label: &str,
    bytes: u64,
    options: &VerifyOptions,
    acc: &mut Accumulator,
) {
    let n = chunk.len();
    acc.total_samples += n as u64;
    acc.total_bytes += bytes;
    acc.file_sizes.push(bytes as f64 / 1024.0 / 1024.0);

    let mut speed = RunningStats::default();
    let mut steer = RunningStats::default();
    let mut throttle = RunningStats::default();
    let mut brake = RunningStats::default();
    let mut invalid_commands = Vec::new();

    for row in chunk.target_rows() {
        speed.push(f64::from(row.speed_kmh()));
        steer.push(f64::from(row.steer()));
        throttle.push(f64::from(row.throttle()));
        brake.push(f64::from(row.brake()));

        let code = row.as_array()[contracts::ControlVector::COMMAND].round() as i32;
        *acc.commands.entry(code).or_insert(0) += 1;
        if !NavigationCommand::from_code(code).is_known() && !invalid_commands.contains(&code) {
            invalid_commands.push(code);
        }
    }

    let mut warnings = Vec::new();
    let brightness = mean_intensity(&chunk.rgb);
    if brightness < options.min_brightness {
        warnings.push(format!("images too dark (mean {brightness:.2})"));
    }
    if n > 0 && speed.max() > options.max_speed_kmh {
        warnings.push(format!("implausible speed (max {:.1} km/h)", speed.max()));
    }
    if n > 0 && out_of_range(&steer, options.steer_range) {
        warnings.push(format!(
            "steer out of range ({:.2} ~ {:.2})",
            steer.min(),
            steer.max()
        ));
    }
    if n > 0 && out_of_range(&throttle, options.pedal_range) {
        warnings.push(format!(
            "throttle out of range ({:.2} ~ {:.2})",
            throttle.min(),
            throttle.max()
        ));
    }
    if n > 0 && out_of_range(&brake, options.pedal_range) {
        warnings.push(format!(
            "brake out of range ({:.2} ~ {:.2})",
            brake.min(),
            brake.max()
        ));
    }
    if !invalid_commands.is_empty() {
        invalid_commands.sort_unstable();
        warnings.push(format!("invalid command codes: {invalid_commands:?}"));
    }

    if n < options.expected_chunk_size {
        acc.incomplete.push(IncompleteFile {
            file: label.to_string(),
            samples: n,
        });
    }
    if !warnings.is_empty() {
        debug!(file = %label, ?warnings, "Chunk has warnings");
        acc.warnings.push(FileWarnings {
            file: label.to_string(),
            warnings,
        });
    }

    acc.speed.merge(&speed);
    acc.steer.merge(&steer);
    acc.throttle.merge(&throttle);
    acc.brake.merge(&brake);
}

fn out_of_range(stats: &RunningStats, (lo, hi): (f32, f32)) -> bool {
    stats.min() < f64::from(lo) || stats.max() > f64::from(hi)
}

fn command_label(code: i32) -> String {
    let command = NavigationCommand::from_code(code);
    if command.is_known() {
        command.name().to_string()
    } else {
        format!("Unknown({code})")
    }
}

fn relative_label(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// All chunk files below `dir`, sorted by path.
pub fn find_chunk_files(dir: &Path) -> Result<Vec<PathBuf>, PersistenceError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current).map_err(|e| PersistenceError::io(&current, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PersistenceError::io(&current, e))?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(ContainerFormat::from_extension)
                .is_some()
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PersistenceWriter;
    use bytes::Bytes;
    use contracts::{ControlVector, OutputConfig, Sample, VehicleControl, IMAGE_BYTES};
    use tempfile::tempdir;

    fn sample(brightness: u8, speed: f32, steer: f32, command: NavigationCommand) -> Sample {
        let control = VehicleControl {
            steer,
            throttle: 0.4,
            brake: 0.0,
        };
        Sample::new(
            Bytes::from(vec![brightness; IMAGE_BYTES]),
            ControlVector::new(control, speed, command),
        )
        .unwrap()
    }

    fn writer(dir: &Path, stamp: &str) -> PersistenceWriter {
        let config = OutputConfig {
            save_path: dir.to_path_buf(),
            ..OutputConfig::default()
        };
        PersistenceWriter::new(&config)
            .unwrap()
            .with_fixed_timestamp(stamp)
    }

    #[test]
    fn test_aggregates_commands_and_speed() {
        let dir = tempdir().unwrap();
        let w = writer(dir.path(), "20250101_000001");
        let left: Vec<_> = (0..3)
            .map(|i| sample(100, 20.0 + i as f32, 0.0, NavigationCommand::Left))
            .collect();
        let follow: Vec<_> = (0..2)
            .map(|_| sample(100, 40.0, 0.1, NavigationCommand::Follow))
            .collect();
        w.write(&left, NavigationCommand::Left).unwrap();
        w.write(&follow, NavigationCommand::Follow).unwrap();

        let report = verify_directory(dir.path(), &VerifyOptions::default()).unwrap();
        assert_eq!(report.total_files, 2);
        assert_eq!(report.valid_files, 2);
        assert_eq!(report.total_samples, 5);
        assert_eq!(report.command_distribution.get("Left"), Some(&3));
        assert_eq!(report.command_distribution.get("Follow"), Some(&2));
        assert_eq!(report.speed_kmh.max, 40.0);
        assert_eq!(report.speed_kmh.min, 20.0);
        assert_eq!(report.incomplete_files.len(), 2);
        assert!(report.warning_files.is_empty());
    }

    #[test]
    fn test_flags_warnings_and_corruption() {
        let dir = tempdir().unwrap();
        let w = writer(dir.path(), "20250101_000002");
        w.write(
            &[sample(2, 180.0, 1.5, NavigationCommand::Right)],
            NavigationCommand::Right,
        )
        .unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("broken.npz"), b"not a zip").unwrap();

        let report = verify_directory(dir.path(), &VerifyOptions::default()).unwrap();
        assert_eq!(report.total_files, 2);
        assert_eq!(report.valid_files, 1);
        assert_eq!(report.corrupted_files.len(), 1);
        assert!(report.corrupted_files[0].file.contains("broken.npz"));

        let warnings = &report.warning_files[0].warnings;
        assert!(warnings.iter().any(|w| w.contains("too dark")));
        assert!(warnings.iter().any(|w| w.contains("speed")));
        assert!(warnings.iter().any(|w| w.contains("steer")));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_verification_is_idempotent() {
        let dir = tempdir().unwrap();
        let w = writer(dir.path(), "20250101_000003");
        let samples: Vec<_> = (0..7)
            .map(|i| sample(50 + i, i as f32, -0.2, NavigationCommand::Straight))
            .collect();
        w.write(&samples, NavigationCommand::Straight).unwrap();

        let first = verify_directory(dir.path(), &VerifyOptions::default()).unwrap();
        let second = verify_directory(dir.path(), &VerifyOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_report_saved_as_json() {
        let dir = tempdir().unwrap();
        let report = verify_directory(dir.path(), &VerifyOptions::default()).unwrap();
        let path = report.save(dir.path()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["total_files"], 0);
        // the report itself is not picked up as a chunk
        assert_eq!(find_chunk_files(dir.path()).unwrap().len(), 0);
    }
}
