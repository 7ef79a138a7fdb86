//! Active parameter probing ("smart scan").
//!
//! One request per index, one short-timeout read per request. Devices answer
//! only the indices they populate; a long unbroken run of silence marks the
//! end of a device's populated region and the rest of its range is skipped.
//! Transport hiccups are failed probes, never scan-enders.

use crate::config::ScanConfig;
use crate::constants::{COMMAND_OFFSET, FRAME_PREFIX_SIZE, FRAME_TRAILER_SIZE, START_BYTE};
use crate::decode::decode_parameter;
use crate::error::GazError;
use crate::frame::{Command, Frame};
use crate::param::ParameterRecord;
use crate::scanner::StatusSink;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// Budget for draining stale bytes before each request.
const FLUSH_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Response reads go through a buffer this large; device answers are far
/// smaller.
const PROBE_READ_BUF: usize = 1024;

/// Status is emitted every this many indices to bound notification volume.
const STATUS_EVERY: u16 = 10;

/// Locate a read response inside raw received bytes and return its body.
///
/// The bridge occasionally prepends noise, so the start marker is searched
/// for rather than assumed at offset 0. Only the command byte is validated
/// here; devices that answered at all have already passed the bus's own
/// framing, and the decoder rejects anything structurally broken.
pub fn extract_response_body(resp: &[u8]) -> Result<Bytes, GazError> {
    let start = resp
        .iter()
        .position(|&b| b == START_BYTE)
        .ok_or_else(|| GazError::InvalidFrame("no start marker in response".into()))?;
    let frame = &resp[start..];
    if frame.len() < FRAME_PREFIX_SIZE + FRAME_TRAILER_SIZE {
        return Err(GazError::InsufficientData {
            expected: FRAME_PREFIX_SIZE + FRAME_TRAILER_SIZE,
            actual: frame.len(),
        });
    }
    let command = frame[COMMAND_OFFSET];
    if command != u8::from(Command::ReadParamResponse) {
        return Err(GazError::InvalidFrame(format!(
            "unexpected command {command:#04x} in response"
        )));
    }
    Ok(Bytes::copy_from_slice(
        &frame[FRAME_PREFIX_SIZE..frame.len() - FRAME_TRAILER_SIZE],
    ))
}

/// Walks one device's parameter index space over a borrowed transport.
pub struct Prober<'a, S> {
    stream: &'a mut S,
    config: &'a ScanConfig,
    records: &'a mpsc::UnboundedSender<ParameterRecord>,
    status: &'a StatusSink,
    running: &'a AtomicBool,
}

impl<'a, S: AsyncRead + AsyncWrite + Unpin> Prober<'a, S> {
    pub fn new(
        stream: &'a mut S,
        config: &'a ScanConfig,
        records: &'a mpsc::UnboundedSender<ParameterRecord>,
        status: &'a StatusSink,
        running: &'a AtomicBool,
    ) -> Self {
        Self {
            stream,
            config,
            records,
            status,
            running,
        }
    }

    /// Probe every index in the configured range, abandoning the device once
    /// the empty streak hits the configured limit. `progress_base` and
    /// `progress_span` map this device's share onto the overall progress
    /// range. Returns the number of records emitted.
    pub async fn probe_device(
        &mut self,
        device: u16,
        progress_base: f32,
        progress_span: f32,
    ) -> u32 {
        let range = self.config.index_range.clone();
        let total = range.len().max(1);
        let mut empty_streak = 0u32;
        let mut found = 0u32;

        for (pos, index) in range.enumerate() {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            if index % STATUS_EVERY == 0 {
                let progress = progress_base + progress_span * (pos as f32 / total as f32);
                self.status
                    .emit(format!("Device {device}: index {index}..."), Some(progress));
            }
            if empty_streak >= self.config.empty_streak_limit {
                info!(device, index, "empty region detected, abandoning device");
                self.status.emit(
                    format!("Device {device}: empty region detected, skipping device"),
                    None,
                );
                break;
            }

            sleep(self.config.probe_delay).await;

            match self.probe_index(device, index).await {
                Ok(Some(record)) => {
                    debug!(device, index, name = %record.name, value = %record.value, "parameter decoded");
                    empty_streak = 0;
                    found += 1;
                    let _ = self.records.send(record);
                }
                Ok(None) => {
                    empty_streak += 1;
                }
                Err(err) => {
                    debug!(device, index, %err, "probe failed");
                    empty_streak += 1;
                }
            }
        }
        found
    }

    /// One request/response exchange. `Ok(None)` is an empty or undecodable
    /// slot; `Err` is a transport-level failure. Both count as a failed probe.
    async fn probe_index(
        &mut self,
        device: u16,
        index: u16,
    ) -> Result<Option<ParameterRecord>, GazError> {
        self.flush_stale().await;

        let request = Frame::read_request(device, self.config.source_addr, index).encode();
        debug!(bytes = hex::encode(&request), "probe write");
        self.stream.write_all(&request).await?;

        let mut buf = vec![0u8; PROBE_READ_BUF];
        let n = timeout(self.config.probe_timeout, self.stream.read(&mut buf)).await??;
        if n == 0 {
            return Ok(None);
        }
        debug!(bytes = hex::encode(&buf[..n]), "probe read");

        match extract_response_body(&buf[..n]) {
            Ok(body) => Ok(decode_parameter(device, index, &body)),
            Err(err) => {
                debug!(device, index, %err, "response rejected");
                Ok(None)
            }
        }
    }

    /// Discard unread bytes left over from earlier traffic so stale data is
    /// never mistaken for this request's response.
    async fn flush_stale(&mut self) {
        let mut scratch = [0u8; 4096];
        loop {
            match timeout(FLUSH_READ_TIMEOUT, self.stream.read(&mut scratch)).await {
                Ok(Ok(n)) if n > 0 => {
                    debug!(discarded = n, "flushed stale bytes");
                }
                _ => break,
            }
        }
    }
}
