//! Scan orchestration.
//!
//! A scan runs on one dedicated worker task that owns the TCP connection for
//! its whole lifetime: connect, sniff for a fixed window, resolve the target
//! list, probe each device in ascending address order. The consumer watches
//! two non-blocking channels (status text with optional progress, decoded
//! records) and cancels cooperatively through a shared flag that the worker
//! checks at phase boundaries and at the top of every index iteration.

use crate::config::ScanConfig;
use crate::error::GazError;
use crate::param::ParameterRecord;
use crate::probe::Prober;
use crate::sniff::Sniffer;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use strum_macros::Display;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

/// Upper bound for one blocking sniff read; also the cancellation latency
/// during the sniffing phase.
const SNIFF_READ_TIMEOUT: Duration = Duration::from_secs(1);

const SNIFF_READ_BUF: usize = 4096;

/// Scan lifecycle. `Cancelled` is reachable from every non-terminal phase;
/// the two terminal phases both close the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum ScanPhase {
    Idle,
    Connecting,
    Sniffing,
    Resolving,
    Probing,
    Completed,
    Cancelled,
}

/// One status notification: free text plus an optional overall progress
/// percentage (0–100). Sniffing owns the first half of the range, probing
/// splits the second half evenly across devices.
#[derive(Debug, Clone, Serialize)]
pub struct ScanStatus {
    pub message: String,
    pub progress: Option<f32>,
}

/// Non-blocking emitter for status notifications. Sends never wait on the
/// consumer; a departed consumer is ignored.
#[derive(Clone)]
pub struct StatusSink(mpsc::UnboundedSender<ScanStatus>);

impl StatusSink {
    pub fn new(tx: mpsc::UnboundedSender<ScanStatus>) -> Self {
        Self(tx)
    }

    pub fn emit(&self, message: impl Into<String>, progress: Option<f32>) {
        let message = message.into();
        debug!(%message, ?progress, "status");
        let _ = self.0.send(ScanStatus { message, progress });
    }
}

/// What a finished scan covered.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub devices: Vec<u16>,
    pub parameters: u32,
    pub cancelled: bool,
}

/// Cancels the scan it was taken from. Cheap to clone into signal handlers.
#[derive(Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Entry point: build with a [`ScanConfig`], call [`Scanner::start`].
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Spawn the scan worker and hand back its output channels.
    pub fn start(self) -> ScanHandle {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (record_tx, record_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        let worker = ScanWorker {
            config: self.config,
            status: StatusSink(status_tx),
            records: record_tx,
            running: Arc::clone(&running),
            phase: ScanPhase::Idle,
        };
        let task = tokio::spawn(worker.run());
        ScanHandle {
            status: status_rx,
            records: record_rx,
            running,
            task,
        }
    }
}

/// Consumer side of a running scan.
pub struct ScanHandle {
    pub status: mpsc::UnboundedReceiver<ScanStatus>,
    pub records: mpsc::UnboundedReceiver<ParameterRecord>,
    running: Arc<AtomicBool>,
    task: JoinHandle<Result<ScanSummary, GazError>>,
}

impl ScanHandle {
    /// Request a cooperative stop. The in-flight exchange finishes first.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn canceller(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.running))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Wait for the worker to finish. The only terminal error is a failed
    /// connect; a cancelled scan still yields a summary.
    pub async fn join(self) -> Result<ScanSummary, GazError> {
        self.task.await?
    }
}

struct ScanWorker {
    config: ScanConfig,
    status: StatusSink,
    records: mpsc::UnboundedSender<ParameterRecord>,
    running: Arc<AtomicBool>,
    phase: ScanPhase,
}

impl ScanWorker {
    async fn run(mut self) -> Result<ScanSummary, GazError> {
        self.set_phase(ScanPhase::Connecting);
        self.status
            .emit(format!("Connecting to {}...", self.config.endpoint()), Some(0.0));
        let mut stream = match self.connect().await {
            Ok(stream) => stream,
            Err(err) => {
                self.status.emit(format!("Connection error: {err}"), None);
                self.set_phase(ScanPhase::Completed);
                self.running.store(false, Ordering::Relaxed);
                return Err(err);
            }
        };

        let discovered = self.sniff_phase(&mut stream).await;
        if !self.is_running() {
            return Ok(self.finish(stream, Vec::new(), 0).await);
        }

        self.set_phase(ScanPhase::Resolving);
        let devices = self.resolve_targets(discovered);

        self.set_phase(ScanPhase::Probing);
        let total = devices.len();
        let mut parameters = 0u32;
        for (i, &device) in devices.iter().enumerate() {
            if !self.is_running() {
                break;
            }
            let base = 50.0 + (i as f32 / total as f32) * 50.0;
            let span = 50.0 / total as f32;
            self.status.emit(
                format!("Phase 2: scanning device {device} ({}/{total})", i + 1),
                Some(base),
            );
            let mut prober = Prober::new(
                &mut stream,
                &self.config,
                &self.records,
                &self.status,
                &self.running,
            );
            parameters += prober.probe_device(device, base, span).await;
        }

        Ok(self.finish(stream, devices, parameters).await)
    }

    async fn connect(&self) -> Result<TcpStream, GazError> {
        let endpoint = self.config.endpoint();
        let stream = timeout(self.config.connect_timeout, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| GazError::Connect {
                endpoint: endpoint.clone(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            })?
            .map_err(|source| GazError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;
        info!(%endpoint, "connected");
        Ok(stream)
    }

    /// Listen for the configured window, collecting addresses from whatever
    /// traffic the bus produces on its own. Read errors and a closed peer are
    /// "no data this iteration", not scan-enders.
    async fn sniff_phase(&mut self, stream: &mut TcpStream) -> BTreeSet<u16> {
        self.set_phase(ScanPhase::Sniffing);
        let window = self.config.sniff_window;
        self.status.emit(
            format!("Phase 1: passive sniffing ({}s)...", window.as_secs()),
            Some(0.0),
        );

        let mut sniffer = Sniffer::new(self.config.source_addr);
        let started = Instant::now();
        let mut buf = vec![0u8; SNIFF_READ_BUF];
        while started.elapsed() < window && self.is_running() {
            let elapsed = started.elapsed();
            let remaining = window.saturating_sub(elapsed);
            let progress = (elapsed.as_secs_f32() / window.as_secs_f32()) * 50.0;
            self.status.emit(
                format!("Listening... {}s remaining", remaining.as_secs()),
                Some(progress),
            );

            let tick = SNIFF_READ_TIMEOUT.min(remaining);
            match timeout(tick, stream.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => sniffer.push(&buf[..n]),
                Ok(Ok(_)) => {
                    warn!("connection closed by peer during sniffing");
                    sleep(tick).await;
                }
                Ok(Err(err)) => {
                    debug!(%err, "sniff read error");
                    sleep(tick).await;
                }
                Err(_) => {} // quiet bus this tick
            }
        }
        info!(devices = sniffer.device_count(), "sniffing window closed");
        sniffer.into_devices()
    }

    /// Freeze the target list: the sniffed set in ascending order, or the
    /// configured fallback when the bus stayed silent.
    fn resolve_targets(&self, discovered: BTreeSet<u16>) -> Vec<u16> {
        if discovered.is_empty() {
            let mut fallback = self.config.fallback_devices.clone();
            fallback.sort_unstable();
            fallback.dedup();
            self.status.emit(
                format!("No traffic detected. Forcing scan on devices {fallback:?}."),
                None,
            );
            fallback
        } else {
            let devices: Vec<u16> = discovered.into_iter().collect();
            self.status
                .emit(format!("Devices detected: {devices:?}"), None);
            devices
        }
    }

    /// Terminal bookkeeping shared by every exit path: the connection is
    /// closed here exactly once.
    async fn finish(
        &mut self,
        mut stream: TcpStream,
        devices: Vec<u16>,
        parameters: u32,
    ) -> ScanSummary {
        let cancelled = !self.is_running();
        if cancelled {
            self.set_phase(ScanPhase::Cancelled);
            self.status.emit("Scan cancelled.", None);
        } else {
            self.set_phase(ScanPhase::Completed);
            self.status.emit("SCAN COMPLETED!", Some(100.0));
        }
        if let Err(err) = stream.shutdown().await {
            debug!(%err, "error shutting down connection");
        }
        self.running.store(false, Ordering::Relaxed);
        ScanSummary {
            devices,
            parameters,
            cancelled,
        }
    }

    fn set_phase(&mut self, phase: ScanPhase) {
        debug!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
