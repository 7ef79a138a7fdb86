//! Scan configuration, injected at construction.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

/// Everything a scan needs to know up front. No process-global state: tests
/// and concurrent scans each carry their own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// IP of the EcoNet/PLUM TCP bridge.
    pub host: String,
    /// Bridge port; the converters ship listening on 8899.
    pub port: u16,
    /// Address the scanner claims on the bus. 0 is the touch panel (master);
    /// 100 (room thermostat) and 250 (service computer) are known alternates
    /// worth trying when a scan comes back empty.
    pub source_addr: u16,
    /// Passive sniffing window before active probing starts.
    pub sniff_window: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// How long to wait for a device to answer one probe.
    pub probe_timeout: Duration,
    /// Inter-index delay throttling the request rate.
    pub probe_delay: Duration,
    /// Consecutive empty indices after which a device's remaining range is
    /// abandoned.
    pub empty_streak_limit: u32,
    /// Parameter index space walked per device.
    pub index_range: Range<u16>,
    /// Probed when the sniffing window sees no traffic at all.
    pub fallback_devices: Vec<u16>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.38".to_string(),
            port: 8899,
            source_addr: 0,
            sniff_window: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(1),
            probe_timeout: Duration::from_millis(200),
            probe_delay: Duration::from_millis(10),
            empty_streak_limit: 100,
            index_range: 0..1000,
            fallback_devices: vec![1, 100],
        }
    }
}

impl ScanConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
