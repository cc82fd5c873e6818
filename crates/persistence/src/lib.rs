//! # Persistence
//!
//! 数据块落盘与读回。
//!
//! - `PersistenceWriter`: 分段 -> ≤ chunk_size 的压缩容器文件 (实现 `SegmentSink`)
//! - `read_chunk`: 读回单个数据块并校验形状
//! - `verify_directory`: 目录级验证报告
//!
//! 容器格式：
//! - `.npz` (默认): zip 内含 `rgb.npy` (u8 [N,88,200,3]) 与 `targets.npy` (f32 [N,25])
//! - `.h5` (`hdf5` feature): 同名 dataset，gzip 压缩

mod container;
mod error;
mod naming;
mod verify;
mod writer;

pub use container::{is_supported, read_chunk, write_chunk, LoadedChunk, RGB_FRAME_SHAPE};
pub use error::PersistenceError;
pub use naming::{ChunkName, MAX_PART};
pub use verify::{
    find_chunk_files, verify_directory, CorruptedFile, FileWarnings, IncompleteFile,
    VerificationReport, VerifyOptions, REPORT_FILE_NAME,
};
pub use writer::PersistenceWriter;
