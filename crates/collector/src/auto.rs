//! 全自动全图采集
//!
//! 从地图 spawn 点生成路线对，逐条验证并驱动一次状态机 (自动批准 gate)，
//! 结束后把总体统计写入 `<save_path>/collection_statistics.json`。
//! 中断会停止路线循环，统计文件仍然写出。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use contracts::{CollectorBlueprint, ContractError, SegmentSink};
use serde::Serialize;
use simulator::SimulatorClient;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::gate::AutoApproveGate;
use crate::machine::{CollectionStateMachine, StopReason};
use crate::routes::{generate_route_pairs, RoutePair};
use crate::stats::CollectionStatistics;

/// Statistics file written next to the data
pub const STATISTICS_FILE_NAME: &str = "collection_statistics.json";

/// A route that could not be driven
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRoute {
    pub start: usize,
    pub end: usize,
    pub reason: String,
}

/// Contents of `collection_statistics.json`
#[derive(Debug, Clone, Serialize)]
pub struct AutoCollectionSummary {
    pub total_routes_attempted: usize,
    pub total_routes_completed: usize,
    pub total_frames_collected: u64,
    pub total_frames_saved: u64,
    pub total_time_seconds: f64,
    pub failed_routes: Vec<FailedRoute>,
    pub interrupted: bool,
    /// ISO-8601 local time
    pub timestamp: String,
}

impl AutoCollectionSummary {
    /// Write the summary into `dir` as pretty JSON.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ContractError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(STATISTICS_FILE_NAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ContractError::Other(format!("failed to serialise statistics: {e}")))?;
        fs::write(&path, json).map_err(|e| ContractError::persistence(&path, e.to_string()))?;
        Ok(path)
    }
}

/// Outcome of a full-town run
#[derive(Debug, Clone)]
pub struct AutoReport {
    pub summary: AutoCollectionSummary,
    pub statistics: CollectionStatistics,
    pub statistics_path: PathBuf,
}

/// Unattended multi-route collector
pub struct AutoCollector<C, W> {
    client: C,
    sink: W,
    blueprint: CollectorBlueprint,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C, W> AutoCollector<C, W>
where
    C: SimulatorClient,
    W: SegmentSink,
{
    pub fn new(client: C, sink: W, blueprint: CollectorBlueprint) -> Self {
        Self {
            client,
            sink,
            blueprint,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Candidate routes for the connected map
    pub fn plan_routes(&self) -> Result<Vec<RoutePair>, ContractError> {
        let points = self.client.spawn_points()?;
        Ok(generate_route_pairs(&points, &self.blueprint.auto))
    }

    /// Connect, drive every generated route and write the statistics file.
    #[instrument(name = "auto_collect", skip(self), fields(map = %self.blueprint.simulator.map))]
    pub async fn run(&mut self) -> Result<AutoReport, ContractError> {
        let started = Instant::now();
        self.client.connect(&self.blueprint.simulator).await?;

        let routes = self.plan_routes()?;
        info!(
            routes = routes.len(),
            strategy = ?self.blueprint.auto.strategy,
            "Route pairs generated"
        );

        let mut collection = self.blueprint.collection.clone();
        collection.max_frames = self
            .blueprint
            .auto
            .frames_per_route
            .max(collection.segment_size as u64);

        let mut totals = CollectionStatistics::default();
        let mut attempted = 0;
        let mut completed = 0;
        let mut failed = Vec::new();
        let mut interrupted = false;

        for (index, route) in routes.iter().enumerate() {
            if self.shutdown_requested() {
                interrupted = true;
                break;
            }
            attempted += 1;
            info!(
                route = index + 1,
                total = routes.len(),
                start = route.start,
                end = route.end,
                distance_m = format!("{:.1}", route.distance_m),
                "Starting route"
            );

            match self.drive_route(route, &collection).await {
                Ok((stop_reason, stats)) => {
                    totals.absorb(&stats);
                    if stop_reason == StopReason::UserAbort {
                        interrupted = true;
                        observability::record_route_outcome(false);
                        break;
                    }
                    completed += 1;
                    observability::record_route_outcome(true);
                }
                Err(e) => {
                    warn!(start = route.start, end = route.end, error = %e, "Route failed");
                    observability::record_route_outcome(false);
                    failed.push(FailedRoute {
                        start: route.start,
                        end: route.end,
                        reason: e.to_string(),
                    });
                }
            }

            info!(
                attempted,
                completed,
                failed = failed.len(),
                frames = totals.frames_collected,
                elapsed_s = format!("{:.0}", started.elapsed().as_secs_f64()),
                "Overall progress"
            );
        }

        totals.duration = started.elapsed();
        let summary = AutoCollectionSummary {
            total_routes_attempted: attempted,
            total_routes_completed: completed,
            total_frames_collected: totals.frames_collected,
            total_frames_saved: totals.frames_saved,
            total_time_seconds: totals.duration.as_secs_f64(),
            failed_routes: failed,
            interrupted,
            timestamp: chrono::Local::now().to_rfc3339(),
        };
        let statistics_path = summary.save(&self.blueprint.output.save_path)?;
        info!(path = %statistics_path.display(), "Collection statistics written");

        Ok(AutoReport {
            summary,
            statistics: totals,
            statistics_path,
        })
    }

    /// Validate, spawn, collect and tear down one route.
    async fn drive_route(
        &mut self,
        route: &RoutePair,
        collection: &contracts::CollectionConfig,
    ) -> Result<(StopReason, CollectionStatistics), ContractError> {
        let plan = self.client.trace_route(route.start, route.end).await?;
        info!(length_m = format!("{:.1}", plan.length_m), legs = plan.legs.len(), "Route validated");

        let drive = self
            .client
            .spawn_ego(&self.blueprint.vehicle, &self.blueprint.camera, route.start, route.end)
            .await?;

        let mut machine = CollectionStateMachine::new(
            drive,
            AutoApproveGate::new(),
            &mut self.sink,
            collection,
            self.blueprint.commands.clone(),
        );
        if let Some(rx) = &self.shutdown {
            machine = machine.with_shutdown(rx.clone());
        }

        let result = machine.run().await;
        let (drive, _, _) = machine.into_parts();
        if let Err(e) = self.client.teardown(drive).await {
            warn!(error = %e, "Teardown failed");
        }

        let report = result?;
        info!(
            reason = %report.stop_reason,
            frames = report.statistics.frames_collected,
            "Route finished"
        );
        Ok((report.stop_reason, report.statistics))
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
