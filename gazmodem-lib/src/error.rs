use std::io;
use thiserror::Error;

/// The primary error type for the `gazmodem-lib` crate.
///
/// Only `Connect` is fatal to a scan. Everything else is recoverable at the
/// point it occurs: codec errors resynchronize byte by byte, probe errors
/// count as an empty index and the scan moves on.
#[derive(Error, Debug)]
pub enum GazError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("timed out waiting for the bus: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    Crc { expected: u16, actual: u16 },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("scan worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
