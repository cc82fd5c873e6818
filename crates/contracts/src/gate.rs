//! InteractionGate trait - 人工/策略决策点
//!
//! 状态机在两次 tick 之间调用 gate，仿真在等待期间冻结。

use crate::{ContractError, NavigationCommand};

/// Operator decision for a pending command segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Open a segment and start collecting
    Approve,
    /// Skip until the command changes
    Reject,
    /// End the session
    Stop,
}

/// Context shown to whoever decides
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionRequest {
    /// Command currently reported by the planner
    pub command: NavigationCommand,
    /// Simulator ticks advanced so far
    pub tick: u64,
    /// Frames counted against the session budget
    pub frames_consumed: u64,
    /// Session budget
    pub max_frames: u64,
    /// Current ego speed (km/h)
    pub speed_kmh: f64,
    /// Samples persisted so far
    pub samples_saved: u64,
}

/// Unsaved segment left open when the session stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSegment {
    pub command: NavigationCommand,
    pub samples: usize,
}

/// Decision capability consumed by the collection state machine
#[trait_variant::make(InteractionGate: Send)]
pub trait LocalInteractionGate {
    /// Ask whether the segment for `request.command` should be collected.
    async fn ask(&mut self, request: &DecisionRequest) -> Result<Decision, ContractError>;

    /// Ask whether a partially filled segment should be saved on exit.
    async fn confirm_final_save(&mut self, pending: &PendingSegment) -> Result<bool, ContractError>;
}
