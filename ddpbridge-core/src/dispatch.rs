//! Tweening dispatch: queue → pixel state → paced serial output
//!
//! Each cycle pops one datagram and handles it in one of three ways:
//!
//! 1. Malformed: counted and discarded.
//! 2. Full RGB frame for the configured LED count: stored as the new
//!    keyframe, then sent directly, or as a paced run of interpolated
//!    frames from the previous keyframe when tweening is on.
//! 3. Anything else: forwarded verbatim without touching pixel state.
//!
//! Settings are snapshotted once per cycle, so changes apply from the
//! next keyframe on.

use crate::constants::DISPATCH_IDLE_WAIT;
use crate::error::ParseError;
use crate::packet::{self, SequenceCounter};
use crate::pixels::{PixelStore, Tween};
use crate::queue::IngressQueue;
use crate::receiver::RawDatagram;
use crate::settings::SharedSettings;
use crate::telemetry::Telemetry;
use crate::transport::SerialWriter;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[cfg(feature = "logging")]
use tracing::debug;

/// What one dispatch cycle did with its datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Malformed datagram, discarded
    Rejected(ParseError),

    /// Keyframe sent as a single pushed packet
    Direct,

    /// Keyframe sent as an interpolated run
    Tweened {
        /// Frames written
        frames: usize,
        /// False when shutdown cut the run short
        completed: bool,
    },

    /// Forwarded verbatim
    PassThrough,
}

/// Consumes the ingress queue and drives the serial writer
pub struct DispatchEngine<W: Write> {
    queue: Arc<IngressQueue<RawDatagram>>,
    settings: Arc<SharedSettings>,
    telemetry: Arc<Telemetry>,
    writer: SerialWriter<W>,
    store: PixelStore,
    sequence: SequenceCounter,
    shutdown: Arc<AtomicBool>,
}

impl<W: Write> DispatchEngine<W> {
    /// Engine for `led_count` LEDs writing to `writer`
    pub fn new(
        led_count: usize,
        queue: Arc<IngressQueue<RawDatagram>>,
        settings: Arc<SharedSettings>,
        telemetry: Arc<Telemetry>,
        writer: SerialWriter<W>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            settings,
            telemetry,
            writer,
            store: PixelStore::new(led_count),
            sequence: SequenceCounter::new(),
            shutdown,
        }
    }

    /// Pixel state as of the last keyframe
    pub fn store(&self) -> &PixelStore {
        &self.store
    }

    /// Serial writer
    pub fn writer(&self) -> &SerialWriter<W> {
        &self.writer
    }

    /// Stop and hand back the serial writer
    pub fn into_writer(self) -> SerialWriter<W> {
        self.writer
    }

    /// Run until shutdown is flagged or the queue is closed
    pub fn run(&mut self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            if let Some(datagram) = self.queue.pop_timeout(DISPATCH_IDLE_WAIT) {
                self.dispatch(&datagram);
            } else if self.queue.is_closed() {
                break;
            }
        }

        #[cfg(feature = "logging")]
        debug!("Dispatch engine stopped");
    }

    /// Handle one datagram
    pub fn dispatch(&mut self, datagram: &RawDatagram) -> DispatchOutcome {
        let parsed = match packet::parse(&datagram.payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.telemetry.record_parse_error();
                #[cfg(feature = "logging")]
                debug!("Discarding datagram from {}: {}", datagram.source, e);
                return DispatchOutcome::Rejected(e);
            }
        };

        if !packet::is_full_frame_update(&parsed, self.store.led_count()) {
            self.telemetry.record_passthrough();
            self.writer.send_packet(&datagram.payload);
            return DispatchOutcome::PassThrough;
        }

        self.store.apply_update(parsed.pixel_data);
        let settings = self.settings.snapshot();

        let tween_from = if settings.tweening_enabled {
            self.store.previous().cloned()
        } else {
            None
        };
        // The length check above guarantees the update was stored
        let Some(current) = self.store.current().cloned() else {
            return DispatchOutcome::Direct;
        };
        let Some(previous) = tween_from else {
            self.send_frame(current.as_bytes(), true);
            return DispatchOutcome::Direct;
        };

        let interval = settings.frame_interval();
        let mut frames = 0;
        for (frame, push) in Tween::new(&previous, &current, u32::from(settings.tweening_steps)) {
            if frames > 0 {
                thread::sleep(interval);
                if self.shutdown.load(Ordering::Relaxed) {
                    return DispatchOutcome::Tweened {
                        frames,
                        completed: false,
                    };
                }
            }
            self.send_frame(frame.as_bytes(), push);
            frames += 1;
        }

        DispatchOutcome::Tweened {
            frames,
            completed: true,
        }
    }

    fn send_frame(&mut self, pixels: &[u8], push: bool) -> bool {
        let packet = packet::build(self.sequence.next_sequence(), pixels, push);
        self.writer.send_packet(&packet)
    }
}
