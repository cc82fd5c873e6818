//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CollectorBlueprint, ContainerFormat};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    map: String,
    route: (usize, usize),
    segment_size: usize,
    max_frames: u64,
    container: String,
    save_path: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                map: blueprint.simulator.map.clone(),
                route: (
                    blueprint.vehicle.spawn_index,
                    blueprint.vehicle.destination_index,
                ),
                segment_size: blueprint.collection.segment_size,
                max_frames: blueprint.collection.max_frames,
                container: blueprint.output.container.extension().to_string(),
                save_path: blueprint.output.save_path.display().to_string(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(blueprint: &CollectorBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.output.chunk_size < blueprint.collection.segment_size {
        warnings.push(format!(
            "output.chunk_size ({}) < collection.segment_size ({}) - segments will be split",
            blueprint.output.chunk_size, blueprint.collection.segment_size
        ));
    }

    if blueprint.output.container == ContainerFormat::Hdf5 && !cfg!(feature = "hdf5") {
        warnings.push("output.container = hdf5 but this binary was built without `hdf5`".to_string());
    }

    if blueprint.collection.max_frames < blueprint.collection.segment_size as u64 {
        warnings.push("collection.max_frames is smaller than one segment".to_string());
    }

    if blueprint.collection.quality.min_brightness == 0.0 {
        warnings.push("collection.quality.min_brightness is 0 - black frames will be kept".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Map: {}", summary.map);
            println!("  Route: {} -> {}", summary.route.0, summary.route.1);
            println!("  Segment size: {}", summary.segment_size);
            println!("  Frame budget: {}", summary.max_frames);
            println!("  Output: {} (.{})", summary.save_path, summary.container);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(content: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_valid_config_reports_summary() {
        let (_file, args) = args_for("[collection]\nsegment_size = 300\n");
        let result = validate_config(&args);
        assert!(result.valid);
        assert_eq!(result.summary.unwrap().segment_size, 300);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let (_file, args) = args_for("[output]\ncompression_level = 12\n");
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("compression_level"));
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/collector.toml".into(),
            json: false,
        };
        assert!(run_validate(&args).is_err());
    }
}
