//! `verify` command implementation.

use anyhow::{Context, Result};
use persistence::{verify_directory, VerifyOptions};
use tracing::{info, warn};

use crate::cli::VerifyArgs;

/// Execute the `verify` command
pub fn run_verify(args: &VerifyArgs) -> Result<()> {
    info!(data_path = %args.data_path.display(), "Verifying collected data");

    if !args.data_path.is_dir() {
        anyhow::bail!("Data directory not found: {}", args.data_path.display());
    }

    let options = VerifyOptions {
        expected_chunk_size: args.chunk_size,
        ..VerifyOptions::default()
    };
    let report = verify_directory(&args.data_path, &options)
        .with_context(|| format!("Failed to verify {}", args.data_path.display()))?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        report.print_summary();
    }

    if args.save_report {
        let path = report.save(&args.data_path)?;
        info!(path = %path.display(), "Verification report written");
    }

    if !report.is_clean() {
        warn!(
            corrupted = report.corrupted_files.len(),
            incomplete = report.incomplete_files.len(),
            "Verification found problems"
        );
    }
    Ok(())
}
