//! Live capture source wrapping pcap

use chrono::{DateTime, Utc};
use pcap::{Active, Capture, Device};
use sniffer_core::{Error, LinkType, RawFrame, Result};
use tracing::{debug, info, warn};

use crate::interface::{resolve_interface, InterfaceInfo};
use crate::stats::{CaptureStats, DeviceStats, StatsAccumulator};

/// Default snapshot length (maximum bytes per frame)
const DEFAULT_SNAPLEN: i32 = 65535;

/// Default read timeout (milliseconds)
const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Configuration for packet capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per frame
    pub snaplen: i32,
    /// Read timeout in milliseconds; bounds how long shutdown waits on a quiet link
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Buffer size (0 = driver default)
    pub buffer_size: i32,
    /// Enable immediate mode (deliver frames as they arrive)
    pub immediate_mode: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
        }
    }
}

/// Outcome of applying the capture filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStatus {
    /// No filter expression was given
    None,
    /// The device accepted the filter
    Applied(String),
    /// The device rejected the filter; capture runs unfiltered
    Rejected { expression: String, reason: String },
}

/// Result of a single read from a frame source
#[derive(Debug)]
pub enum NextFrame {
    Frame(RawFrame),
    /// The read timed out with nothing captured
    Idle,
    /// The source was closed and will yield nothing more
    Closed,
}

/// A blocking source of raw frames
///
/// Implementations are driven from a dedicated blocking thread.
pub trait FrameSource: Send {
    /// Block until the next frame, a read timeout, or the end of the source
    fn next_frame(&mut self) -> Result<NextFrame>;

    /// Statistics for frames read so far
    fn stats(&mut self) -> CaptureStats;

    /// Release the underlying device. Calling it again is a no-op.
    fn close(&mut self);
}

/// Entry point for opening live captures
pub struct CaptureSource;

impl CaptureSource {
    /// Open a live capture on `interface` with the default configuration
    pub fn open(interface: &str, filter: Option<&str>) -> Result<CaptureHandle> {
        Self::open_with_config(interface, filter, &CaptureConfig::default())
    }

    /// Open a live capture on `interface`
    ///
    /// Failure to find, open or activate the device is an error. A filter the
    /// device rejects is not: the handle reports [`FilterStatus::Rejected`]
    /// and captures unfiltered.
    pub fn open_with_config(
        interface: &str,
        filter: Option<&str>,
        config: &CaptureConfig,
    ) -> Result<CaptureHandle> {
        let info = resolve_interface(interface)?;
        debug!(interface, "Initializing pcap capture");

        let mut inactive = Capture::from_device(Device::from(interface))
            .map_err(|e| Error::capture(format!("Failed to create capture: {}", e)))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .immediate_mode(config.immediate_mode);

        if config.buffer_size > 0 {
            inactive = inactive.buffer_size(config.buffer_size);
        }

        let mut capture = inactive
            .open()
            .map_err(|e| Error::capture(format!("Failed to open capture: {}", e)))?;

        let filter_status = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            None => FilterStatus::None,
            Some(expression) => match capture.filter(expression, true) {
                Ok(()) => {
                    debug!(filter = expression, "Applied capture filter");
                    FilterStatus::Applied(expression.to_string())
                }
                Err(e) => {
                    warn!(
                        filter = expression,
                        error = %e,
                        "Capture filter rejected, capturing unfiltered"
                    );
                    FilterStatus::Rejected {
                        expression: expression.to_string(),
                        reason: e.to_string(),
                    }
                }
            },
        };

        let link_type = LinkType::from_dlt(capture.get_datalink().0);
        info!(interface, link_type = %link_type, "Capture opened");

        Ok(CaptureHandle {
            info,
            link_type,
            capture: Some(capture),
            filter_status,
            stats: StatsAccumulator::new(),
            final_device_stats: None,
        })
    }
}

/// An open live capture
pub struct CaptureHandle {
    info: InterfaceInfo,
    link_type: LinkType,
    capture: Option<Capture<Active>>,
    filter_status: FilterStatus,
    stats: StatsAccumulator,
    /// Driver counters read just before the device was released
    final_device_stats: Option<DeviceStats>,
}

impl CaptureHandle {
    pub fn interface(&self) -> &InterfaceInfo {
        &self.info
    }

    /// Link type reported by the device
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn filter_status(&self) -> &FilterStatus {
        &self.filter_status
    }

    pub fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    /// Lazy sequence of captured frames
    ///
    /// Read timeouts are skipped. The sequence ends when the handle is closed;
    /// a device error is yielded once and then ends it.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            source: self,
            done: false,
        }
    }

    /// Driver counters; after close, the last values the device reported
    pub fn device_stats(&mut self) -> Option<DeviceStats> {
        let Some(capture) = self.capture.as_mut() else {
            return self.final_device_stats;
        };
        match capture.stats() {
            Ok(stat) => Some(DeviceStats::from(stat)),
            Err(e) => {
                debug!(error = %e, "Device statistics unavailable");
                None
            }
        }
    }
}

impl FrameSource for CaptureHandle {
    fn next_frame(&mut self) -> Result<NextFrame> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(NextFrame::Closed);
        };

        let next = match capture.next_packet() {
            Ok(packet) => {
                let captured_at = DateTime::<Utc>::from_timestamp(
                    packet.header.ts.tv_sec as i64,
                    (packet.header.ts.tv_usec as u32).saturating_mul(1000),
                )
                .unwrap_or_else(Utc::now);

                self.stats.record_frame(packet.data.len());

                let frame =
                    RawFrame::new(self.info.name.clone(), self.link_type, packet.data.to_vec())
                        .with_timestamp(captured_at)
                        .with_original_len(packet.header.len as usize);
                Ok(NextFrame::Frame(frame))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(NextFrame::Idle),
            Err(pcap::Error::NoMorePackets) => Ok(NextFrame::Closed),
            Err(e) => Err(Error::capture(format!(
                "Read from '{}' failed: {}",
                self.info.name, e
            ))),
        };

        if matches!(next, Ok(NextFrame::Closed)) {
            self.close();
        }
        next
    }

    fn stats(&mut self) -> CaptureStats {
        let device = self.device_stats();
        self.stats.snapshot(device)
    }

    fn close(&mut self) {
        if self.capture.is_some() {
            self.final_device_stats = self.device_stats();
            self.capture = None;
            info!(
                interface = %self.info.name,
                frames = self.stats.frames_captured(),
                "Capture closed"
            );
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Iterator over the frames of a [`FrameSource`]
pub struct Frames<'a> {
    source: &'a mut dyn FrameSource,
    done: bool,
}

impl<'a> Frames<'a> {
    /// Iterate over any frame source
    pub fn new(source: &'a mut dyn FrameSource) -> Self {
        Self {
            source,
            done: false,
        }
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.source.next_frame() {
                Ok(NextFrame::Frame(frame)) => return Some(Ok(frame)),
                Ok(NextFrame::Idle) => continue,
                Ok(NextFrame::Closed) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
