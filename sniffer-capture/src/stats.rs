//! Capture statistics and metrics

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters reported by the capture driver itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    /// Frames that passed the filter
    pub received: u64,
    /// Frames dropped because the kernel buffer was full
    pub dropped: u64,
    /// Frames dropped by the network interface
    pub if_dropped: u64,
}

impl From<pcap::Stat> for DeviceStats {
    fn from(stat: pcap::Stat) -> Self {
        Self {
            received: stat.received as u64,
            dropped: stat.dropped as u64,
            if_dropped: stat.if_dropped as u64,
        }
    }
}

/// Statistics for a capture session
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureStats {
    /// Frames handed to the decoder
    pub frames_captured: u64,
    /// Captured bytes handed to the decoder
    pub bytes_captured: u64,
    /// Driver counters, when the device could report them
    pub device: Option<DeviceStats>,
    /// Capture duration
    pub duration: Duration,
    /// Frames per second
    pub frames_per_second: f64,
    /// Bytes per second
    pub bytes_per_second: f64,
}

impl CaptureStats {
    /// Frames the kernel or interface dropped before we could read them
    pub fn frames_dropped(&self) -> u64 {
        self.device
            .map(|device| device.dropped + device.if_dropped)
            .unwrap_or(0)
    }

    /// Calculate drop rate as percentage of frames seen by the driver
    pub fn drop_rate(&self) -> f64 {
        let seen = self.frames_captured + self.frames_dropped();
        if seen == 0 {
            return 0.0;
        }
        (self.frames_dropped() as f64 / seen as f64) * 100.0
    }

    /// Format statistics as human-readable string
    pub fn format(&self) -> String {
        format!(
            "Captured: {} frames ({} bytes)\n\
             Dropped: {} frames ({:.2}%)\n\
             Duration: {:.2}s\n\
             Rate: {:.2} fps, {:.2} KB/s",
            self.frames_captured,
            self.bytes_captured,
            self.frames_dropped(),
            self.drop_rate(),
            self.duration.as_secs_f64(),
            self.frames_per_second,
            self.bytes_per_second / 1024.0
        )
    }
}

/// Thread-safe statistics accumulator for live capture
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    frames_captured: Arc<AtomicU64>,
    bytes_captured: Arc<AtomicU64>,
    start_time: Instant,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self {
            frames_captured: Arc::new(AtomicU64::new(0)),
            bytes_captured: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a captured frame
    pub fn record_frame(&self, size: usize) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.bytes_captured
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Get current statistics snapshot, merging in driver counters
    pub fn snapshot(&self, device: Option<DeviceStats>) -> CaptureStats {
        let frames_captured = self.frames_captured.load(Ordering::Relaxed);
        let bytes_captured = self.bytes_captured.load(Ordering::Relaxed);
        let duration = self.start_time.elapsed();

        let secs = duration.as_secs_f64();
        let (frames_per_second, bytes_per_second) = if secs > 0.0 {
            (frames_captured as f64 / secs, bytes_captured as f64 / secs)
        } else {
            (0.0, 0.0)
        };

        CaptureStats {
            frames_captured,
            bytes_captured,
            device,
            duration,
            frames_per_second,
            bytes_per_second,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    pub fn bytes_captured(&self) -> u64 {
        self.bytes_captured.load(Ordering::Relaxed)
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
