//! Passive device discovery.
//!
//! The sniffer never transmits. It accumulates whatever the bridge relays,
//! extracts frames with the codec, and collects the source and destination
//! addresses it sees. Joining the stream mid-frame is the normal case, handled
//! by the codec's one-byte resynchronization contract.

use crate::constants::BROADCAST_ADDR;
use crate::frame::{FrameParse, try_parse_frame};
use bytes::BytesMut;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Accumulation state for one sniffing window. Addresses come out in
/// ascending order, which keeps probe ordering reproducible between runs.
#[derive(Debug)]
pub struct Sniffer {
    own_addr: u16,
    buf: BytesMut,
    devices: BTreeSet<u16>,
}

impl Sniffer {
    pub fn new(own_addr: u16) -> Self {
        Self {
            own_addr,
            buf: BytesMut::with_capacity(4096),
            devices: BTreeSet::new(),
        }
    }

    /// Append received bytes and extract every complete frame now available.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        loop {
            match try_parse_frame(&self.buf) {
                FrameParse::Complete(frame, consumed) => {
                    trace!(
                        src = frame.src,
                        dest = frame.dest,
                        command = ?frame.command,
                        "sniffed frame"
                    );
                    self.register(frame.src);
                    self.register(frame.dest);
                    let _ = self.buf.split_to(consumed);
                }
                FrameParse::Invalid(reason) => {
                    trace!(%reason, "resync: dropping one byte");
                    let _ = self.buf.split_to(1);
                }
                FrameParse::NeedMoreData => break,
            }
        }
    }

    fn register(&mut self, addr: u16) {
        if addr == BROADCAST_ADDR || addr == self.own_addr {
            return;
        }
        if self.devices.insert(addr) {
            debug!(addr, "new device observed on the bus");
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Freeze the discovered set; the window is over.
    pub fn into_devices(self) -> BTreeSet<u16> {
        self.devices
    }
}
