//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{PathConfig, PipelineBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    ingest: IngestInfo,
    fanout: FanoutInfo,
    broadcast: BroadcastInfo,
    persistence: PersistenceInfo,
}

#[derive(Serialize)]
struct IngestInfo {
    transport: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    baud_rate: Option<u32>,
    max_line_bytes: usize,
}

#[derive(Serialize)]
struct FanoutInfo {
    broadcast: PathInfo,
    persistence: PathInfo,
}

#[derive(Serialize)]
struct PathInfo {
    overflow: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    capacity: Option<usize>,
}

#[derive(Serialize)]
struct BroadcastInfo {
    bind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    send_timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct PersistenceInfo {
    store: String,
    table: String,
    create_table: bool,
    batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    flush_interval_ms: Option<u64>,
    flush_on_shutdown: bool,
    max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    dead_letter_path: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn path_info(path: &PathConfig) -> PathInfo {
    PathInfo {
        overflow: format!("{:?}", path.overflow),
        capacity: path.overflow.is_bounded().then_some(path.capacity),
    }
}

fn build_config_info(blueprint: &PipelineBlueprint) -> ConfigInfo {
    let ingest = &blueprint.ingest;
    let serial = ingest.transport == contracts::TransportKind::Serial;
    let persistence = &blueprint.persistence;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        ingest: IngestInfo {
            transport: format!("{:?}", ingest.transport),
            bind: (!serial).then(|| ingest.bind.clone()),
            serial_path: ingest.serial_path.clone().filter(|_| serial),
            baud_rate: serial.then_some(ingest.baud_rate),
            max_line_bytes: ingest.max_line_bytes,
        },
        fanout: FanoutInfo {
            broadcast: path_info(&blueprint.fanout.broadcast),
            persistence: path_info(&blueprint.fanout.persistence),
        },
        broadcast: BroadcastInfo {
            bind: blueprint.broadcast.bind.clone(),
            send_timeout_ms: (blueprint.broadcast.send_timeout_ms > 0)
                .then_some(blueprint.broadcast.send_timeout_ms),
        },
        persistence: PersistenceInfo {
            store: format!("{:?}", persistence.store),
            table: persistence
                .table
                .clone()
                .unwrap_or_else(|| format!("{}<YYYYmmdd_HHMMSS>", persistence.table_prefix)),
            create_table: persistence.create_table,
            batch_size: persistence.batch_size,
            flush_interval_ms: (persistence.flush_interval_ms > 0)
                .then_some(persistence.flush_interval_ms),
            flush_on_shutdown: persistence.flush_on_shutdown,
            max_attempts: persistence.retry.max_attempts,
            dead_letter_path: persistence
                .retry
                .dead_letter_path
                .as_ref()
                .map(|p| p.display().to_string()),
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Gyro Relay Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📥 Ingestion");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Transport: {}", info.ingest.transport);
    if let Some(ref bind) = info.ingest.bind {
        println!("   ├─ Bind: {}", bind);
    }
    if let Some(ref path) = info.ingest.serial_path {
        println!("   ├─ Device: {} @ {} baud", path, info.ingest.baud_rate.unwrap_or_default());
    }
    println!("   └─ Max line: {} bytes", info.ingest.max_line_bytes);

    println!("\n🔀 Fan-out");
    for (name, path) in [
        ("broadcast", &info.fanout.broadcast),
        ("persistence", &info.fanout.persistence),
    ] {
        match path.capacity {
            Some(capacity) => println!("   ├─ {}: {} (capacity {})", name, path.overflow, capacity),
            None => println!("   ├─ {}: {}", name, path.overflow),
        }
    }

    println!("\n📡 Broadcast");
    println!("   ├─ Bind: {}", info.broadcast.bind);
    match info.broadcast.send_timeout_ms {
        Some(ms) => println!("   └─ Send timeout: {} ms", ms),
        None => println!("   └─ Send timeout: none"),
    }

    let p = &info.persistence;
    println!("\n💾 Persistence");
    println!("   ├─ Store: {}", p.store);
    println!("   ├─ Table: {} (create: {})", p.table, p.create_table);
    println!("   ├─ Batch size: {}", p.batch_size);
    if let Some(ms) = p.flush_interval_ms {
        println!("   ├─ Flush interval: {} ms", ms);
    }
    println!("   ├─ Flush on shutdown: {}", p.flush_on_shutdown);
    println!("   ├─ Max attempts: {}", p.max_attempts);
    match p.dead_letter_path {
        Some(ref path) => println!("   └─ Dead letters: {}", path),
        None => println!("   └─ Dead letters: disabled"),
    }

    println!();
}
