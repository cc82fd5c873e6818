//! `collect` command implementation.

use anyhow::{Context, Result};
use collector::{AutoApproveGate, CollectionReport, CollectionStateMachine, ConsoleGate};
use config_loader::ConfigLoader;
use contracts::{CollectorBlueprint, ContractError, InteractionGate};
use persistence::PersistenceWriter;
use simulator::{MockDrive, SimulatorClient};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{init_metrics, load_blueprint, mock_client, spawn_shutdown_listener};
use crate::cli::CollectArgs;

/// Execute the `collect` command
pub async fn run_collect(args: &CollectArgs) -> Result<()> {
    let mut blueprint = load_blueprint(&args.session)?;
    if let Some(index) = args.spawn_index {
        blueprint.vehicle.spawn_index = index;
    }
    if let Some(index) = args.destination_index {
        blueprint.vehicle.destination_index = index;
    }
    ConfigLoader::validate(&blueprint).context("Invalid route selection")?;
    init_metrics(args.session.metrics_port)?;

    let start = blueprint.vehicle.spawn_index;
    let end = blueprint.vehicle.destination_index;

    let mut client = mock_client(&blueprint, args.session.realtime);
    client
        .connect(&blueprint.simulator)
        .await
        .context("Failed to connect to simulator")?;

    let plan = client
        .trace_route(start, end)
        .await
        .with_context(|| format!("Route {start} -> {end} is not drivable"))?;
    info!(
        start,
        end,
        length_m = format!("{:.1}", plan.length_m),
        legs = plan.legs.len(),
        "Route planned"
    );

    let drive = client
        .spawn_ego(&blueprint.vehicle, &blueprint.camera, start, end)
        .await
        .context("Failed to spawn ego vehicle")?;
    let writer = PersistenceWriter::new(&blueprint.output)
        .context("Failed to prepare output directory")?;
    let shutdown = spawn_shutdown_listener();

    info!(
        save_path = %blueprint.output.save_path.display(),
        auto_approve = args.auto_approve,
        "Starting collection..."
    );
    let (result, drive) = if args.auto_approve {
        collect_with(drive, AutoApproveGate::new(), writer, &blueprint, shutdown).await
    } else {
        collect_with(drive, ConsoleGate::stdio(), writer, &blueprint, shutdown).await
    };

    if let Err(e) = client.teardown(drive).await {
        warn!(error = %e, "Failed to destroy ego vehicle");
    }

    let report = result.context("Collection failed")?;
    info!(
        reason = %report.stop_reason,
        chunks = report.chunks.len(),
        "CARLA Collect finished"
    );
    report.statistics.print_summary();
    for chunk in &report.chunks {
        println!("   {} ({} samples)", chunk.path.display(), chunk.samples);
    }
    Ok(())
}

/// Run one state machine with the chosen gate and hand the vehicle back.
async fn collect_with<G: InteractionGate>(
    drive: MockDrive,
    gate: G,
    writer: PersistenceWriter,
    blueprint: &CollectorBlueprint,
    shutdown: watch::Receiver<bool>,
) -> (Result<CollectionReport, ContractError>, MockDrive) {
    let mut machine = CollectionStateMachine::new(
        drive,
        gate,
        writer,
        &blueprint.collection,
        blueprint.commands.clone(),
    )
    .with_shutdown(shutdown);
    let result = machine.run().await;
    let (drive, _, _) = machine.into_parts();
    (result, drive)
}
