// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use gazmodem_lib::{ParameterRecord, ScanConfig, Scanner};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Reverse-engineering scanner for the GazModem/PLUM heating bus.
///
/// Listens passively to discover which device addresses are talking, then
/// walks each device's parameter index space and prints every named value it
/// recovers. Ctrl-C stops the scan after the exchange in flight.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// IP address of the EcoNet/PLUM TCP bridge.
    #[arg(long, default_value = "192.168.1.38")]
    ip: String,
    /// TCP port of the bridge.
    #[arg(short, long, default_value_t = 8899)]
    port: u16,
    /// Bus address the scanner claims. 0 is the touch panel; 100 and 250 are
    /// worth trying when a scan comes back empty.
    #[arg(long, default_value_t = 0)]
    source_addr: u16,
    /// Passive sniffing window in seconds before probing starts.
    #[arg(long, default_value_t = 30)]
    sniff_secs: u64,
    /// Consecutive empty indices before a device is abandoned.
    #[arg(long, default_value_t = 100)]
    empty_streak: u32,
    /// First parameter index to probe.
    #[arg(long, default_value_t = 0)]
    start_index: u16,
    /// One past the last parameter index to probe.
    #[arg(long, default_value_t = 1000)]
    end_index: u16,
    /// Write decoded parameters to a semicolon-separated CSV file.
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Print records as JSON lines instead of formatted rows.
    #[arg(long)]
    json: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(
    log_file_path: Option<PathBuf>,
    verbosity: &Verbosity<InfoLevel>,
) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path)
            .with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

fn config_from_cli(cli: &Cli) -> ScanConfig {
    ScanConfig {
        host: cli.ip.clone(),
        port: cli.port,
        source_addr: cli.source_addr,
        sniff_window: Duration::from_secs(cli.sniff_secs),
        empty_streak_limit: cli.empty_streak,
        index_range: cli.start_index..cli.end_index,
        ..ScanConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run_scan(cli).await {
        error!("Scan failed: {:?}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run_scan(cli: Cli) -> Result<()> {
    let config = config_from_cli(&cli);
    info!(endpoint = %config.endpoint(), "Starting GazModem scan");
    let mut handle = Scanner::new(config).start();

    let canceller = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the exchange in flight...");
            canceller.cancel();
        }
    });

    let mut records: Vec<ParameterRecord> = Vec::new();
    let mut status_open = true;
    let mut records_open = true;
    while status_open || records_open {
        tokio::select! {
            status = handle.status.recv(), if status_open => match status {
                Some(status) => match status.progress {
                    Some(progress) => info!("[{progress:>5.1}%] {}", status.message),
                    None => info!("{}", status.message),
                },
                None => status_open = false,
            },
            record = handle.records.recv(), if records_open => match record {
                Some(record) => {
                    if cli.json {
                        println!("{}", serde_json::to_string(&record)?);
                    } else {
                        println!("{record}");
                    }
                    records.push(record);
                }
                None => records_open = false,
            },
        }
    }

    let summary = handle.join().await?;
    info!(
        devices = summary.devices.len(),
        parameters = summary.parameters,
        cancelled = summary.cancelled,
        "Scan finished"
    );

    if let Some(ref path) = cli.csv {
        export_csv(path, &records)?;
        info!("Results written to {:?}", path);
    }
    Ok(())
}

fn export_csv(path: &Path, records: &[ParameterRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("Failed to create CSV file at: {:?}", path))?;
    writer.write_record([
        "Address", "Index", "Name", "Value", "Exponent", "Unit", "Type", "Access",
    ])?;
    for record in records {
        writer.write_record([
            record.device.to_string(),
            record.index.to_string(),
            record.name.clone(),
            record.value.clone(),
            record.exponent.to_string(),
            record.unit.clone(),
            record.type_name.clone(),
            record.access.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
