//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the collector.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Tick Model
//! - The simulator runs in synchronous mode; `FrameSource::tick` is the only suspension point
//! - One tick yields at most one `Sample`
//! - `InteractionGate` is consulted between ticks, the world is frozen while it decides

mod blueprint;
mod command;
mod error;
mod frame_source;
mod gate;
mod sample;
mod segment_sink;

pub use blueprint::*;
pub use command::*;
pub use error::*;
pub use frame_source::{FrameSource, LocalFrameSource};
pub use gate::*;
pub use sample::*;
pub use segment_sink::*;
