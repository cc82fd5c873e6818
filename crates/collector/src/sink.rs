//! 内存 SegmentSink
//!
//! 不落盘，只记录收到的分段；可注入写入失败。用于测试和 dry-run。

use std::path::PathBuf;

use contracts::{ContractError, NavigationCommand, PersistedChunk, Sample, SegmentSink};

/// In-memory segment sink
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Segments received, in order
    pub segments: Vec<(NavigationCommand, Vec<Sample>)>,
    /// Fail this many upcoming writes
    pub fail_next: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        Self {
            fail_next: times,
            ..Self::default()
        }
    }

    pub fn total_samples(&self) -> usize {
        self.segments.iter().map(|(_, s)| s.len()).sum()
    }
}

impl SegmentSink for MemorySink {
    async fn write_segment(
        &mut self,
        samples: Vec<Sample>,
        command: NavigationCommand,
    ) -> Result<Vec<PersistedChunk>, ContractError> {
        let path = PathBuf::from(format!("memory://segment/{}", self.segments.len()));
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ContractError::PersistenceFailure {
                path,
                message: "injected failure".into(),
            });
        }
        let chunk = PersistedChunk {
            path,
            bytes: samples.iter().map(|s| s.rgb().len() as u64).sum(),
            samples: samples.len(),
            part: 1,
            command,
        };
        self.segments.push((command, samples));
        Ok(vec![chunk])
    }
}
