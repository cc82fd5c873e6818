//! PersistenceWriter - 分段落盘
//!
//! 将一个封存的分段切分为 ≤ chunk_size 的数据块，逐个写入压缩容器文件。
//!
//! - 目标目录不存在时自动创建 (幂等)
//! - 文件以独占方式创建，重名时递增 part 序号，不会覆盖已有文件
//! - 写入失败不重试，错误携带文件路径返回给调用方

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use contracts::{
    ContainerFormat, ContractError, NavigationCommand, OutputConfig, PartSuffix, PersistedChunk,
    Sample, SegmentSink,
};
use tracing::{debug, info, instrument, warn};

use crate::container;
use crate::naming::{ChunkName, MAX_PART};
use crate::PersistenceError;

/// Chunked segment writer
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    save_dir: PathBuf,
    format: ContainerFormat,
    compression_level: u8,
    chunk_size: usize,
    part_suffix: PartSuffix,
    /// 固定时间戳 (测试用)
    fixed_stamp: Option<String>,
}

impl PersistenceWriter {
    /// Create a writer from the `[output]` section.
    ///
    /// # Errors
    /// Fails if the configured container is not compiled into this build.
    pub fn new(config: &OutputConfig) -> Result<Self, PersistenceError> {
        if !container::is_supported(config.container) {
            return Err(PersistenceError::UnsupportedContainer(config.container));
        }
        Ok(Self {
            save_dir: config.save_path.clone(),
            format: config.container,
            compression_level: config.compression_level,
            chunk_size: config.chunk_size.max(1),
            part_suffix: config.part_suffix,
            fixed_stamp: None,
        })
    }

    /// Use a fixed timestamp instead of the wall clock.
    pub fn with_fixed_timestamp(mut self, stamp: impl Into<String>) -> Self {
        self.fixed_stamp = Some(stamp.into());
        self
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Persist one sealed segment.
    ///
    /// Returns one [`PersistedChunk`] per file written, in part order.
    #[instrument(
        name = "persistence_write",
        skip(self, samples),
        fields(command = %command, samples = samples.len(), dir = %self.save_dir.display())
    )]
    pub fn write(
        &self,
        samples: &[Sample],
        command: NavigationCommand,
    ) -> Result<Vec<PersistedChunk>, PersistenceError> {
        if samples.is_empty() {
            debug!("Empty segment, nothing to write");
            return Ok(Vec::new());
        }

        fs::create_dir_all(&self.save_dir).map_err(|e| PersistenceError::io(&self.save_dir, e))?;

        let stamp = self
            .fixed_stamp
            .clone()
            .unwrap_or_else(ChunkName::stamp_now);
        let split = samples.len() > self.chunk_size;
        let mut with_suffix = split || self.part_suffix == PartSuffix::Always;
        let mut part = 1u32;
        let mut written = Vec::new();

        for chunk in samples.chunks(self.chunk_size) {
            let started = Instant::now();
            let path = loop {
                if part > MAX_PART {
                    return Err(PersistenceError::PartsExhausted {
                        stem: ChunkName::new(command, stamp.clone(), None, self.format).stem(),
                    });
                }
                let name = ChunkName::new(
                    command,
                    stamp.clone(),
                    with_suffix.then_some(part),
                    self.format,
                );
                let path = self.save_dir.join(name.file_name());
                match container::write_chunk(self.format, &path, chunk, self.compression_level) {
                    Ok(()) => break path,
                    Err(PersistenceError::AlreadyExists { path }) => {
                        debug!(path = %path.display(), "Chunk name taken, advancing part index");
                        if with_suffix {
                            part += 1;
                        } else {
                            with_suffix = true;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, written = written.len(), "Chunk write failed");
                        return Err(e);
                    }
                }
            };

            let bytes = fs::metadata(&path)
                .map(|m| m.len())
                .map_err(|e| PersistenceError::io(&path, e))?;

            observability::record_chunk_written(command.name(), chunk.len(), bytes);
            observability::record_flush_latency_ms(started.elapsed().as_secs_f64() * 1000.0);
            info!(
                path = %path.display(),
                samples = chunk.len(),
                size_mb = format!("{:.2}", bytes as f64 / 1024.0 / 1024.0),
                "Chunk saved"
            );

            written.push(PersistedChunk {
                path,
                bytes,
                samples: chunk.len(),
                part,
                command,
            });
            part += 1;
        }

        Ok(written)
    }
}

impl SegmentSink for PersistenceWriter {
    async fn write_segment(
        &mut self,
        samples: Vec<Sample>,
        command: NavigationCommand,
    ) -> Result<Vec<PersistedChunk>, ContractError> {
        self.write(&samples, command).map_err(|e| {
            observability::record_persistence_failure();
            ContractError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{ControlVector, VehicleControl, IMAGE_BYTES};
    use tempfile::tempdir;

    fn sample(value: u8) -> Sample {
        let targets = ControlVector::new(
            VehicleControl {
                steer: 0.1,
                throttle: 0.5,
                brake: 0.0,
            },
            25.0,
            NavigationCommand::Left,
        );
        Sample::new(Bytes::from(vec![value; IMAGE_BYTES]), targets).unwrap()
    }

    fn writer(dir: &Path, chunk_size: usize, part_suffix: PartSuffix) -> PersistenceWriter {
        let config = OutputConfig {
            save_path: dir.to_path_buf(),
            chunk_size,
            part_suffix,
            ..OutputConfig::default()
        };
        PersistenceWriter::new(&config)
            .unwrap()
            .with_fixed_timestamp("20250101_120000")
    }

    #[test]
    fn test_single_chunk_without_suffix() {
        let dir = tempdir().unwrap();
        let w = writer(dir.path(), 200, PartSuffix::WhenSplit);
        let samples: Vec<_> = (0..5).map(|i| sample(10 + i)).collect();

        let chunks = w.write(&samples, NavigationCommand::Left).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].samples, 5);
        assert!(chunks[0].bytes > 0);
        assert_eq!(
            chunks[0].path.file_name().unwrap().to_str().unwrap(),
            "carla_cmd3_Left_20250101_120000.npz"
        );
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let w = writer(&nested, 200, PartSuffix::WhenSplit);
        w.write(&[sample(9)], NavigationCommand::Follow).unwrap();
        w.write(&[sample(9)], NavigationCommand::Follow).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_oversized_segment_is_split_with_parts() {
        let dir = tempdir().unwrap();
        let w = writer(dir.path(), 4, PartSuffix::WhenSplit);
        let samples: Vec<_> = (0..10).map(|i| sample(i as u8 + 20)).collect();

        let chunks = w.write(&samples, NavigationCommand::Right).unwrap();
        let sizes: Vec<_> = chunks.iter().map(|c| c.samples).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        let names: Vec<_> = chunks
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "carla_cmd4_Right_20250101_120000_part001.npz",
                "carla_cmd4_Right_20250101_120000_part002.npz",
                "carla_cmd4_Right_20250101_120000_part003.npz",
            ]
        );
    }

    #[test]
    fn test_collision_never_overwrites() {
        let dir = tempdir().unwrap();
        let w = writer(dir.path(), 200, PartSuffix::WhenSplit);

        let first = w.write(&[sample(50)], NavigationCommand::Straight).unwrap();
        let second = w.write(&[sample(60)], NavigationCommand::Straight).unwrap();
        let third = w.write(&[sample(70)], NavigationCommand::Straight).unwrap();

        assert_ne!(first[0].path, second[0].path);
        assert!(second[0]
            .path
            .to_string_lossy()
            .ends_with("20250101_120000_part001.npz"));
        assert!(third[0]
            .path
            .to_string_lossy()
            .ends_with("20250101_120000_part002.npz"));

        let back = container::read_chunk(&first[0].path).unwrap();
        assert!(back.rgb.iter().all(|&b| b == 50));
    }

    #[test]
    fn test_always_suffix() {
        let dir = tempdir().unwrap();
        let w = writer(dir.path(), 200, PartSuffix::Always);
        let chunks = w.write(&[sample(1)], NavigationCommand::Follow).unwrap();
        assert!(chunks[0].path.to_string_lossy().ends_with("_part001.npz"));
        assert_eq!(chunks[0].part, 1);
    }

    #[test]
    fn test_empty_segment_writes_nothing() {
        let dir = tempdir().unwrap();
        let w = writer(dir.path(), 200, PartSuffix::WhenSplit);
        assert!(w.write(&[], NavigationCommand::Follow).unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_destination_reports_path() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let w = writer(&blocker, 200, PartSuffix::WhenSplit);
        let err = w.write(&[sample(1)], NavigationCommand::Follow).unwrap_err();
        assert_eq!(err.path(), Some(blocker.as_path()));
    }

    #[tokio::test]
    async fn test_segment_sink_maps_errors() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let mut w = writer(&blocker, 200, PartSuffix::WhenSplit);
        let err = w
            .write_segment(vec![sample(1)], NavigationCommand::Follow)
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::PersistenceFailure { .. }));
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_hdf5_requires_feature() {
        let config = OutputConfig {
            container: ContainerFormat::Hdf5,
            ..OutputConfig::default()
        };
        assert!(matches!(
            PersistenceWriter::new(&config),
            Err(PersistenceError::UnsupportedContainer(ContainerFormat::Hdf5))
        ));
    }
}
