//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CollectorBlueprint, CommandContext, RoadOption};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    blueprint: &'a CollectorBlueprint,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    command_table: Vec<CommandRow>,
}

#[derive(Serialize)]
struct CommandRow {
    road_option: RoadOption,
    mid_route: String,
    mid_route_code: u8,
    terminal: String,
    terminal_code: u8,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = ConfigInfo {
            blueprint: &blueprint,
            command_table: if args.commands {
                command_table(&blueprint)
            } else {
                Vec::new()
            },
        };
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn command_table(blueprint: &CollectorBlueprint) -> Vec<CommandRow> {
    RoadOption::ALL
        .iter()
        .map(|&option| {
            let mid = blueprint.commands.map(option, CommandContext::MidRoute);
            let end = blueprint.commands.map(option, CommandContext::Terminal);
            CommandRow {
                road_option: option,
                mid_route: mid.to_string(),
                mid_route_code: mid.code(),
                terminal: end.to_string(),
                terminal_code: end.code(),
            }
        })
        .collect()
}

fn print_config_info(blueprint: &CollectorBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               CARLA Collect Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let sim = &blueprint.simulator;
    println!("📍 Simulator");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Map: {}", sim.map);
    println!("   ├─ Server: {}:{}", sim.host, sim.port);
    println!(
        "   └─ Step: {:.3}s ({:.0} FPS)",
        sim.fixed_delta_seconds,
        1.0 / sim.fixed_delta_seconds
    );

    let vehicle = &blueprint.vehicle;
    println!("\n🚗 Vehicle");
    println!("   ├─ Blueprint: {}", vehicle.blueprint);
    println!(
        "   ├─ Route: spawn {} -> {}",
        vehicle.spawn_index, vehicle.destination_index
    );
    println!("   ├─ Target speed: {:.0} km/h", vehicle.target_speed_kmh);
    println!(
        "   └─ 📷 Camera {}x{} (fov {:.0}°)",
        blueprint.camera.width, blueprint.camera.height, blueprint.camera.fov
    );

    let collection = &blueprint.collection;
    println!("\n⚙️  Collection");
    println!("   ├─ Frame budget: {}", collection.max_frames);
    println!("   ├─ Segment size: {}", collection.segment_size);
    println!("   ├─ Skip timeout: {} ticks", collection.skip_timeout_ticks);
    println!("   ├─ Warm-up: {} ticks", collection.warmup_ticks);
    println!(
        "   └─ Quality: brightness ≥ {:.1}, speed ≤ {:.0} km/h",
        collection.quality.min_brightness, collection.quality.max_speed_kmh
    );

    let output = &blueprint.output;
    println!("\n📤 Output");
    println!("   ├─ Path: {}", output.save_path.display());
    println!("   ├─ Container: .{}", output.container.extension());
    println!("   ├─ Chunk size: {}", output.chunk_size);
    println!("   └─ Compression: {}", output.compression_level);

    let auto = &blueprint.auto;
    println!("\n🗺️  Auto");
    println!("   ├─ Strategy: {:?}", auto.strategy);
    println!(
        "   ├─ Distance: {:.0}-{:.0} m",
        auto.min_distance_m, auto.max_distance_m
    );
    println!("   ├─ Frames per route: {}", auto.frames_per_route);
    match auto.max_routes {
        Some(n) => println!("   └─ Max routes: {}", n),
        None => println!("   └─ Max routes: unlimited"),
    }

    if args.commands {
        let rows = command_table(blueprint);
        println!("\n🧭 Commands");
        for (i, row) in rows.iter().enumerate() {
            let prefix = if i == rows.len() - 1 { "└─" } else { "├─" };
            if row.mid_route == row.terminal {
                println!("   {} {:?} -> {} ({})", prefix, row.road_option, row.mid_route, row.mid_route_code);
            } else {
                println!(
                    "   {} {:?} -> {} ({}) / at goal {} ({})",
                    prefix,
                    row.road_option,
                    row.mid_route,
                    row.mid_route_code,
                    row.terminal,
                    row.terminal_code
                );
            }
        }
    }

    println!();
}
