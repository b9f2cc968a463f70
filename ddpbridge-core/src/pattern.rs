//! Startup colour sweep for checking the LED chain end to end

use crate::packet;
use crate::pixels::PixelFrame;
use crate::telemetry::{Severity, Telemetry};
use crate::transport::SerialWriter;
use bytes::Bytes;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Sweep colours in send order
pub const TEST_COLORS: [(&str, [u8; 3]); 5] = [
    ("Red", [255, 0, 0]),
    ("Green", [0, 255, 0]),
    ("Blue", [0, 0, 255]),
    ("Yellow", [255, 255, 0]),
    ("Magenta", [255, 0, 255]),
];

/// Sequence number of the closing all-black frame
pub const CLEAR_SEQUENCE: u8 = 0x0F;

/// Hold time per colour
pub const PATTERN_INTERVAL: Duration = Duration::from_secs(1);

/// Sends the sweep over a serial writer
#[derive(Debug, Clone)]
pub struct TestPattern {
    led_count: usize,
    interval: Duration,
}

impl TestPattern {
    /// Sweep for `led_count` LEDs
    pub fn new(led_count: usize) -> Self {
        Self {
            led_count,
            interval: PATTERN_INTERVAL,
        }
    }

    /// Override the hold time per colour
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Every packet of the sweep, closing frame last
    pub fn packets(&self) -> Vec<Bytes> {
        TEST_COLORS
            .iter()
            .enumerate()
            .map(|(index, (_, rgb))| self.packet(index as u8, *rgb))
            .chain(std::iter::once(self.packet(CLEAR_SEQUENCE, [0, 0, 0])))
            .collect()
    }

    /// Send the sweep, then clear the LEDs
    ///
    /// Returns the number of packets written. When `shutdown` is raised
    /// mid-sweep the remaining colours are skipped but the LEDs are still
    /// cleared.
    pub fn send<W: Write>(
        &self,
        writer: &mut SerialWriter<W>,
        telemetry: &Arc<Telemetry>,
        shutdown: &AtomicBool,
    ) -> usize {
        telemetry.log(Severity::Info, "[TEST] Starting LED test sequence...");
        let mut sent = 0;

        for (index, (name, rgb)) in TEST_COLORS.iter().enumerate() {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            if writer.send_packet(&self.packet(index as u8, *rgb)) {
                sent += 1;
                telemetry.log(
                    Severity::Info,
                    format!("[TEST] Sent {} to {} LEDs (flags: 0x41)", name, self.led_count),
                );
            }
            thread::sleep(self.interval);
        }

        if writer.send_packet(&self.packet(CLEAR_SEQUENCE, [0, 0, 0])) {
            sent += 1;
        }
        telemetry.log(Severity::Info, "[TEST] Test sequence complete - LEDs cleared");
        sent
    }

    fn packet(&self, sequence: u8, rgb: [u8; 3]) -> Bytes {
        packet::build(sequence, PixelFrame::solid(self.led_count, rgb).as_bytes(), true)
    }
}
