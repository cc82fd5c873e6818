//! Command implementations.

mod auto;
mod collect;
mod info;
mod validate;
mod verify;

pub use auto::run_auto;
pub use collect::run_collect;
pub use info::run_info;
pub use validate::run_validate;
pub use verify::run_verify;

use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::CollectorBlueprint;
use simulator::{MockDriveConfig, MockSimulatorClient, MockSimulatorConfig};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::SessionArgs;

/// Load the blueprint (or defaults) and apply command-line overrides.
pub(crate) fn load_blueprint(session: &SessionArgs) -> Result<CollectorBlueprint> {
    let mut blueprint = match &session.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("No configuration file given, using defaults");
            CollectorBlueprint::default()
        }
    };

    if let Some(host) = &session.host {
        blueprint.simulator.host = host.clone();
    }
    if let Some(port) = session.port {
        blueprint.simulator.port = port;
    }
    if let Some(map) = &session.map {
        blueprint.simulator.map = map.clone();
    }
    if let Some(max_frames) = session.max_frames {
        blueprint.collection.max_frames = max_frames;
    }
    if let Some(save_path) = &session.save_path {
        blueprint.output.save_path = save_path.clone();
    }

    ConfigLoader::validate(&blueprint).context("Configuration invalid after overrides")?;
    Ok(blueprint)
}

/// Start the Prometheus endpoint when a port is given.
pub(crate) fn init_metrics(port: u16) -> Result<()> {
    if port > 0 {
        observability::init_metrics_only(port)?;
    }
    Ok(())
}

/// Grid-map simulator used when no CARLA server is linked in.
pub(crate) fn mock_client(blueprint: &CollectorBlueprint, realtime: bool) -> MockSimulatorClient {
    let drive = MockDriveConfig {
        tick_interval: realtime
            .then(|| Duration::from_secs_f64(blueprint.simulator.fixed_delta_seconds)),
        ..MockDriveConfig::default()
    };
    MockSimulatorClient::with_config(MockSimulatorConfig {
        drive,
        ..MockSimulatorConfig::default()
    })
}

/// Flip a watch flag on Ctrl+C or SIGTERM.
///
/// The receiver is checked by the state machine between ticks and while
/// waiting for an operator decision.
pub(crate) fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping collection...");
        let _ = tx.send(true);
        // keep the sender alive so receivers never observe a closed channel
        tx.closed().await;
    });
    rx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
