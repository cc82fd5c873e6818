//! CollectionStateMachine - 按导航指令分段的采集状态机
//!
//! 状态：
//! - `AwaitingDecision` (初始)：询问 gate 是否采集当前指令
//! - `Collecting`：每 tick 取一个样本，质量过滤后追加到分段；满或路线结束时落盘
//! - `Skipping`：只推进 tick，指令变化或超时后回到 `AwaitingDecision`
//! - `Stopped`：终止；打开的分段非空时最后询问一次是否保存
//!
//! `FrameSource::tick` 是唯一推进世界的 await；gate 在两次 tick 之间被询问，
//! 等待期间仿真冻结。

use std::future::pending;
use std::time::Instant;

use contracts::{
    CollectionConfig, CommandMapping, ContractError, ControlVector, Decision, DecisionRequest,
    FrameSource, InteractionGate, NavigationCommand, PendingSegment, PersistedChunk, Sample,
    SegmentSink,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::buffer::SegmentBuffer;
use crate::classifier::CommandClassifier;
use crate::quality::{rejection_label, QualityFilter};
use crate::stats::CollectionStatistics;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Operator answered stop
    UserStop,
    /// Interrupt signal
    UserAbort,
    /// Agent reached its destination
    RouteCompleted,
    /// `max_frames` consumed
    FrameBudgetExhausted,
}

impl StopReason {
    pub const fn label(self) -> &'static str {
        match self {
            StopReason::UserStop => "user_stop",
            StopReason::UserAbort => "user_abort",
            StopReason::RouteCompleted => "route_completed",
            StopReason::FrameBudgetExhausted => "frame_budget_exhausted",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    AwaitingDecision,
    Collecting,
    Skipping,
    Stopped(StopReason),
}

impl CollectorState {
    pub const fn label(self) -> &'static str {
        match self {
            CollectorState::AwaitingDecision => "awaiting_decision",
            CollectorState::Collecting => "collecting",
            CollectorState::Skipping => "skipping",
            CollectorState::Stopped(_) => "stopped",
        }
    }

    pub const fn is_stopped(self) -> bool {
        matches!(self, CollectorState::Stopped(_))
    }
}

/// Command being skipped and for how long
#[derive(Debug, Clone, Copy)]
struct SkipState {
    command: NavigationCommand,
    ticks: u64,
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub stop_reason: StopReason,
    pub statistics: CollectionStatistics,
    pub chunks: Vec<PersistedChunk>,
}

/// Command-segmented collection state machine
pub struct CollectionStateMachine<S, G, W> {
    source: S,
    gate: G,
    sink: W,
    config: CollectionConfig,
    classifier: CommandClassifier,
    filter: QualityFilter,
    buffer: SegmentBuffer,
    stats: CollectionStatistics,
    state: CollectorState,
    skip: Option<SkipState>,
    chunks: Vec<PersistedChunk>,
    shutdown: Option<watch::Receiver<bool>>,
    finished: bool,
}

impl<S, G, W> CollectionStateMachine<S, G, W>
where
    S: FrameSource,
    G: InteractionGate,
    W: SegmentSink,
{
    pub fn new(
        source: S,
        gate: G,
        sink: W,
        config: &CollectionConfig,
        mapping: CommandMapping,
    ) -> Self {
        Self {
            source,
            gate,
            sink,
            classifier: CommandClassifier::new(mapping),
            filter: QualityFilter::new(&config.quality),
            buffer: SegmentBuffer::new(config.segment_size),
            config: config.clone(),
            stats: CollectionStatistics::default(),
            state: CollectorState::AwaitingDecision,
            skip: None,
            chunks: Vec::new(),
            shutdown: None,
            finished: false,
        }
    }

    /// Observe an interrupt flag; `true` turns into `Stopped(UserAbort)`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn statistics(&self) -> &CollectionStatistics {
        &self.stats
    }

    /// Samples in the open segment
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn chunks(&self) -> &[PersistedChunk] {
        &self.chunks
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_parts(self) -> (S, G, W) {
        (self.source, self.gate, self.sink)
    }

    /// Warm up, run until stopped, then settle the open segment.
    ///
    /// If the loop fails (e.g. the simulator connection drops) the final
    /// save prompt is still offered before the error is returned.
    #[instrument(
        name = "collection_run",
        skip(self),
        fields(segment_size = self.config.segment_size, max_frames = self.config.max_frames)
    )]
    pub async fn run(&mut self) -> Result<CollectionReport, ContractError> {
        let started = Instant::now();
        let outcome = self.drive().await;
        if let Err(e) = &outcome {
            error!(error = %e, buffered = self.buffer.len(), "Collection loop failed");
        }
        let settled = self.finish().await;
        self.stats.duration += started.elapsed();
        outcome?;
        settled?;

        let CollectorState::Stopped(stop_reason) = self.state else {
            return Err(ContractError::Other("collection loop ended without stopping".into()));
        };
        info!(
            reason = %stop_reason,
            collected = self.stats.frames_collected,
            saved = self.stats.frames_saved,
            segments = self.stats.segments_saved,
            "Collection finished"
        );
        Ok(CollectionReport {
            stop_reason,
            statistics: self.stats.clone(),
            chunks: self.chunks.clone(),
        })
    }

    async fn drive(&mut self) -> Result<(), ContractError> {
        self.warm_up().await?;
        while !self.state.is_stopped() {
            self.step().await?;
        }
        Ok(())
    }

    /// Tick until the first camera frame, then `warmup_ticks` more.
    ///
    /// # Errors
    /// `SensorTimeout` if no frame arrives within `first_frame_timeout_ticks`.
    pub async fn warm_up(&mut self) -> Result<(), ContractError> {
        let mut waited = 0;
        while self.source.latest_frame().is_none() {
            if self.shutdown_requested() {
                self.transition(CollectorState::Stopped(StopReason::UserAbort));
                return Ok(());
            }
            if waited >= self.config.first_frame_timeout_ticks {
                return Err(ContractError::SensorTimeout { ticks: waited });
            }
            self.tick().await?;
            waited += 1;
        }
        debug!(waited, "First camera frame received");

        for _ in 0..self.config.warmup_ticks {
            if self.shutdown_requested() {
                self.transition(CollectorState::Stopped(StopReason::UserAbort));
                return Ok(());
            }
            self.tick().await?;
        }
        info!(ticks = self.stats.ticks, "Sensors ready");
        Ok(())
    }

    /// Execute one unit of work for the current state.
    ///
    /// `AwaitingDecision` consults the gate without ticking; `Collecting` and
    /// `Skipping` advance exactly one tick.
    pub async fn step(&mut self) -> Result<CollectorState, ContractError> {
        if !self.state.is_stopped() && self.shutdown_requested() {
            info!(buffered = self.buffer.len(), "Interrupt received");
            self.transition(CollectorState::Stopped(StopReason::UserAbort));
        }

        match self.state {
            CollectorState::AwaitingDecision => self.await_decision().await?,
            CollectorState::Collecting => self.collect_tick().await?,
            CollectorState::Skipping => self.skip_tick().await?,
            CollectorState::Stopped(_) => {}
        }
        Ok(self.state)
    }

    /// Offer the last save-or-discard decision for a non-empty open segment.
    ///
    /// Runs at most once.
    pub async fn finish(&mut self) -> Result<(), ContractError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let Some(command) = self.buffer.command().filter(|_| !self.buffer.is_empty()) else {
            self.buffer.drain();
            return Ok(());
        };
        let pending = PendingSegment {
            command,
            samples: self.buffer.len(),
        };
        warn!(command = %command, samples = pending.samples, "Open segment has unsaved samples");

        if self.gate.confirm_final_save(&pending).await? {
            self.flush().await
        } else {
            self.buffer.drain();
            self.stats.segments_discarded += 1;
            warn!(samples = pending.samples, "Pending segment discarded");
            Ok(())
        }
    }

    async fn await_decision(&mut self) -> Result<(), ContractError> {
        if self.budget_exhausted() {
            self.transition(CollectorState::Stopped(StopReason::FrameBudgetExhausted));
            return Ok(());
        }
        if self.source.is_route_completed() {
            self.transition(CollectorState::Stopped(StopReason::RouteCompleted));
            return Ok(());
        }

        let command = self.current_command();
        let request = DecisionRequest {
            command,
            tick: self.stats.ticks,
            frames_consumed: self.stats.frames_consumed(),
            max_frames: self.config.max_frames,
            speed_kmh: self.speed_kmh(),
            samples_saved: self.stats.frames_saved,
        };

        let Some(decision) = self.ask_gate(&request).await? else {
            info!("Interrupt received while waiting for decision");
            self.transition(CollectorState::Stopped(StopReason::UserAbort));
            return Ok(());
        };

        match decision {
            Decision::Approve => {
                self.buffer.open(command);
                info!(command = %command, code = command.code(), "Segment approved");
                self.transition(CollectorState::Collecting);
            }
            Decision::Reject => {
                self.stats.segments_skipped += 1;
                self.skip = Some(SkipState { command, ticks: 0 });
                info!(command = %command, "Segment rejected, skipping until command changes");
                self.transition(CollectorState::Skipping);
            }
            Decision::Stop => self.transition(CollectorState::Stopped(StopReason::UserStop)),
        }
        Ok(())
    }

    async fn collect_tick(&mut self) -> Result<(), ContractError> {
        self.tick().await?;

        if self.source.is_route_completed() {
            info!(buffered = self.buffer.len(), "Route completed while collecting");
            self.flush().await?;
            self.transition(CollectorState::Stopped(StopReason::RouteCompleted));
            return Ok(());
        }

        let Some(command) = self.buffer.command() else {
            warn!("Collecting without an open segment");
            self.transition(CollectorState::AwaitingDecision);
            return Ok(());
        };

        if let Some(sample) = self.capture() {
            match self.filter.inspect(&sample) {
                Some(rejection) => {
                    self.stats.record_rejection(&rejection);
                    observability::record_sample_rejected(rejection_label(&rejection));
                    debug!(%rejection, tick = self.stats.ticks, "Sample rejected");
                }
                None => {
                    self.buffer.append(sample)?;
                    self.stats.frames_collected += 1;
                    observability::record_sample_collected(command.name());
                    if self.progress_due(self.stats.frames_collected) {
                        info!(
                            command = %command,
                            buffered = self.buffer.len(),
                            collected = self.stats.frames_collected,
                            max_frames = self.config.max_frames,
                            "Collecting"
                        );
                    }
                }
            }
        }

        if self.buffer.is_full() {
            self.flush().await?;
            self.transition(CollectorState::AwaitingDecision);
        } else if self.budget_exhausted() {
            info!(max_frames = self.config.max_frames, "Frame budget exhausted");
            self.flush().await?;
            self.transition(CollectorState::Stopped(StopReason::FrameBudgetExhausted));
        }
        Ok(())
    }

    async fn skip_tick(&mut self) -> Result<(), ContractError> {
        self.tick().await?;
        self.stats.frames_skipped += 1;

        let Some(skip) = self.skip.as_mut() else {
            self.transition(CollectorState::AwaitingDecision);
            return Ok(());
        };
        skip.ticks += 1;
        let SkipState { command: origin, ticks } = *skip;

        if self.source.is_route_completed() {
            self.end_skip("route_completed");
            self.transition(CollectorState::Stopped(StopReason::RouteCompleted));
            return Ok(());
        }

        let command = self.current_command();
        if command != origin {
            info!(from = %origin, to = %command, ticks, "Command changed");
            self.end_skip("command_changed");
            self.transition(CollectorState::AwaitingDecision);
        } else if ticks >= self.config.skip_timeout_ticks {
            warn!(command = %origin, ticks, "Command unchanged for too long, asking again");
            self.end_skip("timeout");
            self.transition(CollectorState::AwaitingDecision);
        } else if self.budget_exhausted() {
            self.end_skip("budget");
            self.transition(CollectorState::Stopped(StopReason::FrameBudgetExhausted));
        } else if self.progress_due(ticks) {
            info!(command = %origin, ticks, "Skipping");
        }
        Ok(())
    }

    fn end_skip(&mut self, outcome: &'static str) {
        self.skip = None;
        observability::record_segment_skipped(outcome);
    }

    /// Build a sample from the latest frame, `None` on a sensor gap.
    ///
    /// The label is the command observed on this tick; the segment's approved
    /// command only names the file.
    fn capture(&mut self) -> Option<Sample> {
        let Some(frame) = self.source.latest_frame() else {
            self.stats.sensor_gaps += 1;
            debug!(tick = self.stats.ticks, "No camera frame");
            return None;
        };

        let targets = ControlVector::new(
            self.source.vehicle_control(),
            self.speed_kmh() as f32,
            self.current_command(),
        );
        match frame.to_rgb8().and_then(|rgb| Sample::from_frame(&rgb, targets)) {
            Ok(sample) => Some(sample),
            Err(e) => {
                self.stats.sensor_gaps += 1;
                warn!(error = %e, "Dropping malformed frame");
                None
            }
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        let command = self.buffer.command();
        let samples = self.buffer.drain();
        let Some(command) = command.filter(|_| !samples.is_empty()) else {
            debug!("Empty segment, nothing to flush");
            return Ok(());
        };
        let count = samples.len();

        match self.sink.write_segment(samples, command).await {
            Ok(chunks) => {
                self.stats.record_saved(command, &chunks);
                info!(
                    command = %command,
                    samples = count,
                    files = chunks.len(),
                    total_saved = self.stats.frames_saved,
                    "Segment saved"
                );
                self.chunks.extend(chunks);
                Ok(())
            }
            Err(e @ ContractError::PersistenceFailure { .. }) => {
                self.stats.segments_failed += 1;
                error!(error = %e, command = %command, samples = count, "Segment lost, continuing");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn ask_gate(&mut self, request: &DecisionRequest) -> Result<Option<Decision>, ContractError> {
        match self.shutdown.as_mut() {
            Some(rx) => tokio::select! {
                decision = self.gate.ask(request) => decision.map(Some),
                () = shutdown_signalled(rx) => Ok(None),
            },
            None => self.gate.ask(request).await.map(Some),
        }
    }

    async fn tick(&mut self) -> Result<u64, ContractError> {
        let frame = self.source.tick().await?;
        self.stats.ticks += 1;
        observability::record_tick(self.state.label());
        Ok(frame)
    }

    fn transition(&mut self, to: CollectorState) {
        let from = self.state;
        if from == to {
            return;
        }
        match to {
            CollectorState::Stopped(reason) => {
                info!(from = from.label(), %reason, tick = self.stats.ticks, "Stopped")
            }
            _ => debug!(from = from.label(), to = to.label(), tick = self.stats.ticks, "State transition"),
        }
        observability::record_state_transition(from.label(), to.label());
        self.state = to;
    }

    fn current_command(&mut self) -> NavigationCommand {
        let option = self.source.navigation_command();
        let completed = self.source.is_route_completed();
        self.classifier.classify(option, completed)
    }

    fn speed_kmh(&self) -> f64 {
        let v = self.source.vehicle_velocity();
        nalgebra::Vector3::new(v.x, v.y, v.z).norm() * 3.6
    }

    fn budget_exhausted(&self) -> bool {
        self.stats.frames_consumed() >= self.config.max_frames
    }

    fn progress_due(&self, count: u64) -> bool {
        let interval = self.config.progress_interval;
        interval > 0 && count > 0 && count % interval == 0
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Resolves once the flag is `true`; never if the sender is gone.
async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use super::*;
    use crate::gate::{ConsoleGate, ScriptedGate};
    use crate::sink::MemorySink;
    use contracts::{CameraConfig, RoadOption};
    use simulator::{MockDrive, MockDriveConfig, RouteLeg};

    fn config() -> CollectionConfig {
        CollectionConfig {
            warmup_ticks: 0,
            ..CollectionConfig::default()
        }
    }

    fn drive(legs: Vec<RouteLeg>, tweak: impl FnOnce(&mut MockDriveConfig)) -> MockDrive {
        let mut drive_config = MockDriveConfig {
            sensor_delay_ticks: 0,
            ..MockDriveConfig::default()
        };
        tweak(&mut drive_config);
        MockDrive::new(legs, &CameraConfig::default(), drive_config)
    }

    fn machine(
        source: MockDrive,
        gate: ScriptedGate,
        sink: MemorySink,
        config: &CollectionConfig,
    ) -> CollectionStateMachine<MockDrive, ScriptedGate, MemorySink> {
        CollectionStateMachine::new(source, gate, sink, config, CommandMapping::default())
    }

    #[tokio::test]
    async fn test_approve_collects_one_full_segment() {
        let source = drive(vec![RouteLeg::new(RoadOption::Left, 1000)], |_| {});
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, MemorySink::new(), &config());

        let report = sm.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::UserStop);

        let sink = sm.sink();
        assert_eq!(sink.segments.len(), 1);
        let (command, samples) = &sink.segments[0];
        assert_eq!(*command, NavigationCommand::Left);
        assert_eq!(samples.len(), 200);
        assert!(samples.iter().all(|s| s.command() == NavigationCommand::Left));
        assert_eq!(report.statistics.frames_saved, 200);
        assert_eq!(report.chunks.len(), 1);
        assert!(sm.gate().final_prompts.is_empty());
    }

    #[tokio::test]
    async fn test_quality_filter_drops_bad_samples() {
        let source = drive(vec![RouteLeg::new(RoadOption::LaneFollow, 500)], |c| {
            c.dark_ticks = BTreeSet::from([5]);
            c.speed_spikes = BTreeSet::from([8]);
        });
        let config = CollectionConfig {
            segment_size: 20,
            ..config()
        };
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, MemorySink::new(), &config);

        let report = sm.run().await.unwrap();
        assert_eq!(report.statistics.rejected_dark, 1);
        assert_eq!(report.statistics.rejected_speed, 1);

        let (_, samples) = &sm.sink().segments[0];
        assert_eq!(samples.len(), 20);
        for sample in samples {
            assert!(sample.mean_brightness() >= 5.0);
            assert!(sample.targets().speed_kmh() <= 150.0);
        }
    }

    #[tokio::test]
    async fn test_reject_skips_until_command_changes() {
        // warm-up consumes tick 1, skipping covers ticks 2..=51, Left from tick 52
        let source = drive(
            vec![
                RouteLeg::new(RoadOption::LaneFollow, 51),
                RouteLeg::new(RoadOption::Left, 50),
            ],
            |_| {},
        );
        let gate = ScriptedGate::new([Decision::Reject], false);
        let mut sm = machine(source, gate, MemorySink::new(), &config());

        sm.warm_up().await.unwrap();
        assert_eq!(sm.step().await.unwrap(), CollectorState::Skipping);
        for _ in 0..50 {
            assert_eq!(sm.step().await.unwrap(), CollectorState::Skipping);
        }
        assert_eq!(sm.step().await.unwrap(), CollectorState::AwaitingDecision);
        assert_eq!(sm.statistics().frames_skipped, 51);
        assert!(sm.sink().segments.is_empty());
    }

    #[tokio::test]
    async fn test_skip_timeout_guarantees_liveness() {
        let source = drive(vec![RouteLeg::new(RoadOption::LaneFollow, 10_000)], |_| {});
        let gate = ScriptedGate::new([Decision::Reject], false);
        let mut sm = machine(source, gate, MemorySink::new(), &config());

        sm.warm_up().await.unwrap();
        sm.step().await.unwrap();
        let mut steps = 0;
        while sm.step().await.unwrap() == CollectorState::Skipping {
            steps += 1;
            assert!(steps < 500);
        }
        assert_eq!(sm.state(), CollectorState::AwaitingDecision);
        assert_eq!(sm.statistics().frames_skipped, 500);
    }

    async fn interrupt_with_37_buffered(save: bool) -> (usize, Vec<PendingSegment>) {
        let (tx, rx) = watch::channel(false);
        let source = drive(vec![RouteLeg::new(RoadOption::Right, 1000)], |_| {});
        let gate = ScriptedGate::new([Decision::Approve], save);
        let mut sm = machine(source, gate, MemorySink::new(), &config()).with_shutdown(rx);

        sm.warm_up().await.unwrap();
        assert_eq!(sm.step().await.unwrap(), CollectorState::Collecting);
        for _ in 0..37 {
            sm.step().await.unwrap();
        }
        assert_eq!(sm.buffered(), 37);

        tx.send(true).unwrap();
        assert_eq!(
            sm.step().await.unwrap(),
            CollectorState::Stopped(StopReason::UserAbort)
        );
        sm.finish().await.unwrap();
        (sm.sink().total_samples(), sm.gate().final_prompts.clone())
    }

    #[tokio::test]
    async fn test_interrupt_mid_segment_confirmed() {
        let (saved, prompts) = interrupt_with_37_buffered(true).await;
        assert_eq!(saved, 37);
        assert_eq!(
            prompts,
            vec![PendingSegment {
                command: NavigationCommand::Right,
                samples: 37
            }]
        );
    }

    #[tokio::test]
    async fn test_interrupt_mid_segment_declined() {
        let (saved, prompts) = interrupt_with_37_buffered(false).await;
        assert_eq!(saved, 0);
        assert_eq!(prompts.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_stop_collection() {
        let source = drive(vec![RouteLeg::new(RoadOption::LaneFollow, 500)], |_| {});
        let config = CollectionConfig {
            segment_size: 10,
            ..config()
        };
        let gate = ScriptedGate::new([Decision::Approve, Decision::Approve], false);
        let mut sm = machine(source, gate, MemorySink::failing(1), &config);

        let report = sm.run().await.unwrap();
        assert_eq!(report.statistics.segments_failed, 1);
        assert_eq!(report.statistics.segments_saved, 1);
        assert_eq!(report.statistics.frames_collected, 20);
        assert_eq!(sm.sink().total_samples(), 10);
    }

    #[tokio::test]
    async fn test_route_completion_flushes_partial_segment() {
        let source = drive(vec![RouteLeg::new(RoadOption::Straight, 30)], |_| {});
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, MemorySink::new(), &config());

        let report = sm.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::RouteCompleted);
        // tick 1 is warm-up, ticks 2..=30 collect, tick 31 completes
        assert_eq!(sm.sink().total_samples(), 29);
        assert_eq!(sm.sink().segments[0].0, NavigationCommand::Straight);
        assert!(sm.gate().final_prompts.is_empty());
    }

    #[tokio::test]
    async fn test_frame_budget_stops_and_flushes() {
        let source = drive(vec![RouteLeg::new(RoadOption::LaneFollow, 500)], |_| {});
        let config = CollectionConfig {
            max_frames: 15,
            ..config()
        };
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, MemorySink::new(), &config);

        let report = sm.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::FrameBudgetExhausted);
        assert_eq!(sm.sink().total_samples(), 15);
    }

    #[tokio::test]
    async fn test_first_frame_timeout() {
        let source = drive(vec![RouteLeg::new(RoadOption::LaneFollow, 500)], |c| {
            c.sensor_delay_ticks = 1000;
        });
        let config = CollectionConfig {
            first_frame_timeout_ticks: 5,
            ..config()
        };
        let mut sm = machine(source, ScriptedGate::default(), MemorySink::new(), &config);
        let err = sm.run().await.unwrap_err();
        assert!(matches!(err, ContractError::SensorTimeout { ticks: 5 }));
    }

    #[tokio::test]
    async fn test_missing_planner_uses_fallback() {
        let source = drive(vec![RouteLeg::new(RoadOption::Left, 500)], |c| {
            c.planner_attached = false;
        });
        let config = CollectionConfig {
            segment_size: 5,
            ..config()
        };
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, MemorySink::new(), &config);

        sm.run().await.unwrap();
        assert_eq!(sm.sink().segments[0].0, NavigationCommand::Follow);
    }

    #[tokio::test]
    async fn test_sample_label_follows_tick_command() {
        // tick 1 warm-up, ticks 2..=20 Left, ticks 21.. LaneFollow
        let source = drive(
            vec![
                RouteLeg::new(RoadOption::Left, 20),
                RouteLeg::new(RoadOption::LaneFollow, 100),
            ],
            |_| {},
        );
        let config = CollectionConfig {
            segment_size: 40,
            ..config()
        };
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, MemorySink::new(), &config);

        sm.run().await.unwrap();
        let (command, samples) = &sm.sink().segments[0];
        assert_eq!(*command, NavigationCommand::Left);
        assert_eq!(samples.len(), 40);
        assert_eq!(samples[0].command(), NavigationCommand::Left);
        let switch = samples
            .iter()
            .position(|s| s.command() == NavigationCommand::Follow)
            .unwrap();
        assert!(switch < 20);
        assert!(samples[switch..]
            .iter()
            .all(|s| s.command() == NavigationCommand::Follow));
    }

    #[tokio::test]
    async fn test_simulator_failure_still_offers_final_save() {
        let source = drive(vec![RouteLeg::new(RoadOption::Left, 500)], |c| {
            c.fail_at_tick = Some(12);
        });
        let gate = ScriptedGate::new([Decision::Approve], true);
        let mut sm = machine(source, gate, MemorySink::new(), &config());

        let err = sm.run().await.unwrap_err();
        assert!(matches!(err, ContractError::SimulatorConnection { .. }));
        assert_eq!(sm.gate().final_prompts.len(), 1);
        assert_eq!(sm.sink().total_samples(), 10);
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting_for_operator() {
        let (tx, rx) = watch::channel(false);
        let (reader, _keep_open) = tokio::io::duplex(64);
        let gate = ConsoleGate::new(tokio::io::BufReader::new(reader), tokio::io::sink());
        let source = drive(vec![RouteLeg::new(RoadOption::Left, 500)], |_| {});
        let mut sm = CollectionStateMachine::new(
            source,
            gate,
            MemorySink::new(),
            &config(),
            CommandMapping::default(),
        )
        .with_shutdown(rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });
        let report = sm.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::UserAbort);
        assert_eq!(report.statistics.ticks, 1);
    }
}
