// src/bin/sniff.rs

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use gazmodem_lib::sniff::Sniffer;
use std::process;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Passive GazModem bus listener: connect, watch the traffic for a while,
/// report which device addresses are talking. Transmits nothing, so it is
/// safe to leave running against a live installation.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// IP address of the EcoNet/PLUM TCP bridge.
    #[arg(long, default_value = "192.168.1.38")]
    ip: String,
    /// TCP port of the bridge.
    #[arg(short, long, default_value_t = 8899)]
    port: u16,
    /// Our own bus address, excluded from the report.
    #[arg(long, default_value_t = 0)]
    source_addr: u16,
    /// How long to listen, in seconds.
    #[arg(long, default_value_t = 30)]
    window_secs: u64,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cli.verbose.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        error!("Sniff failed: {:?}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let endpoint = format!("{}:{}", cli.ip, cli.port);
    info!(%endpoint, "Connecting...");
    let mut stream = timeout(Duration::from_secs(1), TcpStream::connect(&endpoint))
        .await
        .context("Timed out connecting to the bridge")?
        .with_context(|| format!("Failed to connect to {endpoint}"))?;

    let window = Duration::from_secs(cli.window_secs);
    let mut sniffer = Sniffer::new(cli.source_addr);
    let started = Instant::now();
    let mut buf = vec![0u8; 4096];
    info!("Listening for {}s...", window.as_secs());
    while started.elapsed() < window {
        let remaining = window.saturating_sub(started.elapsed());
        match timeout(Duration::from_secs(1).min(remaining), stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                info!("Bridge closed the connection");
                break;
            }
            Ok(Ok(n)) => sniffer.push(&buf[..n]),
            Ok(Err(e)) => {
                info!("Read error, continuing: {e}");
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(_) => {} // quiet bus this tick
        }
    }

    let devices: Vec<u16> = sniffer.into_devices().into_iter().collect();
    if devices.is_empty() {
        info!("No traffic observed. The bus may be idle, or the bridge is not relaying.");
    } else {
        info!("Devices observed: {devices:?}");
        for device in devices {
            println!("{device}");
        }
    }
    Ok(())
}
