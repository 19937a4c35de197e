//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{OverflowPolicy, PipelineBlueprint, StoreKind};
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
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    transport: String,
    broadcast_bind: String,
    store: String,
    batch_size: usize,
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
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    transport: format!("{:?}", blueprint.ingest.transport),
                    broadcast_bind: blueprint.broadcast.bind.clone(),
                    store: format!("{:?}", blueprint.persistence.store),
                    batch_size: blueprint.persistence.batch_size,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let persistence = &blueprint.persistence;

    if persistence.store == StoreKind::Log {
        warnings.push("persistence.store = \"log\" - samples will not be stored".to_string());
    }

    if matches!(
        blueprint.fanout.persistence.overflow,
        OverflowPolicy::DropNewest | OverflowPolicy::DropOldest
    ) {
        warnings.push(
            "fanout.persistence drops samples when full - stored data may have gaps".to_string(),
        );
    }

    if blueprint.broadcast.send_timeout_ms == 0 {
        warnings.push(
            "broadcast.send_timeout_ms = 0 - a stalled subscriber delays every other one"
                .to_string(),
        );
    }

    if persistence.retry.max_attempts > 1 && persistence.retry.dead_letter_path.is_none() {
        warnings.push(
            "persistence.retry has no dead_letter_path - batches failing every attempt are dropped"
                .to_string(),
        );
    }

    if !persistence.flush_on_shutdown {
        warnings.push(
            "persistence.flush_on_shutdown = false - the last partial batch is lost".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Transport: {}", summary.transport);
            println!("  Broadcast: {}", summary.broadcast_bind);
            println!("  Store: {}", summary.store);
            println!("  Batch size: {}", summary.batch_size);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
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
