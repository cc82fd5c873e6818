//! # Collector
//!
//! 按导航指令分段的数据采集核心。
//!
//! ## 数据流
//! ```text
//! FrameSource ──tick──► CollectionStateMachine ──► SegmentBuffer ──flush──► SegmentSink
//!                          │        ▲
//!                          ▼        │ Decision
//!                      InteractionGate
//! ```
//!
//! - `CollectionStateMachine`: AWAITING_DECISION / COLLECTING / SKIPPING / STOPPED
//! - `ConsoleGate` / `AutoApproveGate`: 人工或固定策略决策
//! - `AutoCollector`: 全图多路线自动采集

pub mod auto;
pub mod buffer;
pub mod classifier;
pub mod gate;
pub mod machine;
pub mod quality;
pub mod routes;
pub mod sink;
pub mod stats;

pub use auto::{AutoCollectionSummary, AutoCollector, AutoReport, FailedRoute, STATISTICS_FILE_NAME};
pub use buffer::SegmentBuffer;
pub use classifier::CommandClassifier;
pub use gate::{parse_confirmation, parse_decision, AutoApproveGate, ConsoleGate, ScriptedGate};
pub use machine::{CollectionReport, CollectionStateMachine, CollectorState, StopReason};
pub use quality::{rejection_label, QualityFilter};
pub use routes::{generate_route_pairs, RoutePair};
pub use sink::MemorySink;
pub use stats::CollectionStatistics;
