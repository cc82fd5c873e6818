//! SegmentSink trait - PersistenceWriter 的输出接口

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ContractError, NavigationCommand, Sample};

/// 已写入磁盘的数据块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedChunk {
    /// 文件路径
    pub path: PathBuf,

    /// 文件字节数
    pub bytes: u64,

    /// 样本数量
    pub samples: usize,

    /// 分片序号 (从 1 开始)
    pub part: u32,

    /// 分段指令
    pub command: NavigationCommand,
}

/// Durable destination for sealed segments
#[trait_variant::make(SegmentSink: Send)]
pub trait LocalSegmentSink {
    /// Persist a sealed segment labelled with the command it was approved for.
    ///
    /// # Errors
    /// Returns `PersistenceFailure` with the offending path; the segment is
    /// not retried.
    async fn write_segment(
        &mut self,
        samples: Vec<Sample>,
        command: NavigationCommand,
    ) -> Result<Vec<PersistedChunk>, ContractError>;
}

impl<T: SegmentSink> SegmentSink for &mut T {
    async fn write_segment(
        &mut self,
        samples: Vec<Sample>,
        command: NavigationCommand,
    ) -> Result<Vec<PersistedChunk>, ContractError> {
        SegmentSink::write_segment(&mut **self, samples, command).await
    }
}
