//! `auto` command implementation.

use anyhow::{Context, Result};
use collector::AutoCollector;
use config_loader::ConfigLoader;
use persistence::PersistenceWriter;
use tracing::info;

use super::{init_metrics, load_blueprint, mock_client, spawn_shutdown_listener};
use crate::cli::AutoArgs;

/// Execute the `auto` command
pub async fn run_auto(args: &AutoArgs) -> Result<()> {
    let mut blueprint = load_blueprint(&args.session)?;
    if let Some(strategy) = args.strategy {
        blueprint.auto.strategy = strategy.into();
    }
    if let Some(frames) = args.frames_per_route {
        blueprint.auto.frames_per_route = frames;
    }
    if args.max_routes.is_some() {
        blueprint.auto.max_routes = args.max_routes;
    }
    ConfigLoader::validate(&blueprint).context("Invalid auto collection settings")?;
    init_metrics(args.session.metrics_port)?;

    let client = mock_client(&blueprint, args.session.realtime);
    let writer = PersistenceWriter::new(&blueprint.output)
        .context("Failed to prepare output directory")?;

    info!(
        map = %blueprint.simulator.map,
        strategy = ?blueprint.auto.strategy,
        frames_per_route = blueprint.auto.frames_per_route,
        "Starting automatic collection..."
    );
    let mut auto = AutoCollector::new(client, writer, blueprint)
        .with_shutdown(spawn_shutdown_listener());
    let report = auto.run().await.context("Automatic collection failed")?;

    report.statistics.print_summary();
    let summary = &report.summary;
    println!("🗺️  Routes");
    println!("   ├─ Attempted: {}", summary.total_routes_attempted);
    println!("   ├─ Completed: {}", summary.total_routes_completed);
    println!("   ├─ Failed: {}", summary.failed_routes.len());
    println!("   └─ Interrupted: {}", summary.interrupted);
    for failed in &summary.failed_routes {
        println!("      ✗ {} -> {}: {}", failed.start, failed.end, failed.reason);
    }
    println!("\n📄 Statistics: {}\n", report.statistics_path.display());
    Ok(())
}
