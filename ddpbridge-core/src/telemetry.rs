//! Counters, rolling event log and event feed
//!
//! Lock scope per field group:
//! - counters are independent atomics, no lock
//! - `last_activity` has its own mutex, held only to read or replace the instant
//! - the event log is appended and snapshotted under `log`
//! - `subscribers` is held while fanning one event out; sends never block
//!
//! Nothing here feeds back into control decisions.

use crate::constants::{
    EVENT_LOG_CAPACITY, IDLE_NOTICE_AFTER, STATS_INTERVAL, STATS_TICK, SUBSCRIBER_CAPACITY,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "logging")]
use tracing::{debug, error, info, warn};

/// One entry of the rolling event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLogEntry {
    /// Log text
    pub message: String,

    /// RFC 3339 local time the entry was recorded
    pub timestamp: String,
}

impl EventLogEntry {
    fn now(message: String) -> Self {
        Self {
            message,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Traffic counters as published to the event feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficStats {
    /// Datagrams received
    pub packets_rx: u64,
    /// Packets written to serial
    pub packets_tx: u64,
    /// Bytes received from the network and the device
    pub bytes_rx: u64,
    /// Unencoded packet bytes written to serial
    pub bytes_tx: u64,
}

/// Event pushed to feed subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeEvent {
    /// New event log entry
    Log(EventLogEntry),

    /// Serial connection state changed
    Status {
        /// Whether the last serial write succeeded
        connected: bool,
        /// Device path
        serial_port: String,
    },

    /// Traffic counters changed
    Stats(TrafficStats),
}

impl BridgeEvent {
    /// JSON object with a `type` discriminator
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Full counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Datagrams received
    pub packets_received: u64,
    /// Packets written to serial
    pub packets_sent: u64,
    /// Bytes received from the network and the device
    pub bytes_received: u64,
    /// Unencoded packet bytes written to serial
    pub bytes_sent: u64,
    /// Datagrams discarded as malformed
    pub parse_errors: u64,
    /// Failed serial writes
    pub write_errors: u64,
    /// Datagrams evicted by the ingress queue
    pub frames_dropped: u64,
    /// Diagnostic lines read from the device
    pub device_lines: u64,
    /// Packets forwarded verbatim
    pub passthrough: u64,
}

/// Log severity for [`Telemetry::log`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine progress
    Info,
    /// Degraded but running
    Warn,
    /// Operation failed
    Error,
    /// Recorded for the dashboard only
    Quiet,
}

/// Shared telemetry sink
#[derive(Debug)]
pub struct Telemetry {
    packets_received: AtomicU64,
    packets_sent: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    parse_errors: AtomicU64,
    write_errors: AtomicU64,
    frames_dropped: AtomicU64,
    device_lines: AtomicU64,
    passthrough: AtomicU64,

    last_activity: Mutex<Instant>,
    connected: AtomicBool,
    serial_port: String,

    log: Mutex<VecDeque<EventLogEntry>>,
    log_capacity: usize,

    subscribers: Mutex<Vec<Sender<BridgeEvent>>>,
    last_published: Mutex<Option<TrafficStats>>,
}

impl Telemetry {
    /// Sink for a bridge attached to `serial_port`
    pub fn new(serial_port: impl Into<String>) -> Self {
        Self::with_capacity(serial_port, EVENT_LOG_CAPACITY)
    }

    /// Sink with a custom event log capacity
    pub fn with_capacity(serial_port: impl Into<String>, log_capacity: usize) -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            device_lines: AtomicU64::new(0),
            passthrough: AtomicU64::new(0),
            last_activity: Mutex::new(Instant::now()),
            connected: AtomicBool::new(false),
            serial_port: serial_port.into(),
            log: Mutex::new(VecDeque::with_capacity(log_capacity)),
            log_capacity,
            subscribers: Mutex::new(Vec::new()),
            last_published: Mutex::new(None),
        }
    }

    /// A datagram of `bytes` arrived from the network
    pub fn record_datagram(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.touch();
    }

    /// Raw bytes arrived from the serial device
    pub fn record_serial_bytes(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// A packet of `bytes` (before framing) was written to serial
    pub fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// A datagram failed to parse
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A serial write failed
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// The ingress queue evicted a frame
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// A non-full-frame packet was forwarded verbatim
    pub fn record_passthrough(&self) {
        self.passthrough.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a diagnostic line read from the device
    pub fn record_device_line(&self, line: &str) {
        self.device_lines.fetch_add(1, Ordering::Relaxed);
        self.touch();
        self.log(Severity::Quiet, line);
    }

    /// Mark activity now
    pub fn touch(&self) {
        *lock(&self.last_activity) = Instant::now();
    }

    /// Time since the last recorded activity
    pub fn idle(&self) -> Duration {
        lock(&self.last_activity).elapsed()
    }

    /// Serial device path
    pub fn serial_port(&self) -> &str {
        &self.serial_port
    }

    /// Whether the last serial write succeeded
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Update the connection state, publishing a status event on change
    pub fn set_connected(&self, connected: bool) {
        if self.connected.swap(connected, Ordering::Relaxed) != connected {
            self.publish(BridgeEvent::Status {
                connected,
                serial_port: self.serial_port.clone(),
            });
        }
    }

    /// Append to the event log, mirror to tracing and publish to subscribers
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();

        #[cfg(feature = "logging")]
        match severity {
            Severity::Info => info!("{}", message),
            Severity::Warn => warn!("{}", message),
            Severity::Error => error!("{}", message),
            Severity::Quiet => debug!("{}", message),
        }
        #[cfg(not(feature = "logging"))]
        let _ = severity;

        let entry = EventLogEntry::now(message);
        {
            let mut log = lock(&self.log);
            if log.len() == self.log_capacity {
                log.pop_front();
            }
            log.push_back(entry.clone());
        }
        self.publish(BridgeEvent::Log(entry));
    }

    /// Snapshot of the event log, oldest first
    pub fn recent_events(&self) -> Vec<EventLogEntry> {
        lock(&self.log).iter().cloned().collect()
    }

    /// Traffic counters in the event-feed shape
    pub fn traffic(&self) -> TrafficStats {
        TrafficStats {
            packets_rx: self.packets_received.load(Ordering::Relaxed),
            packets_tx: self.packets_sent.load(Ordering::Relaxed),
            bytes_rx: self.bytes_received.load(Ordering::Relaxed),
            bytes_tx: self.bytes_sent.load(Ordering::Relaxed),
        }
    }

    /// All counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            device_lines: self.device_lines.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
        }
    }

    /// Register a feed subscriber
    ///
    /// Each subscriber gets its own bounded channel. A subscriber that falls
    /// behind misses events instead of stalling the pipeline; one that hangs
    /// up is pruned on the next publish.
    pub fn subscribe(&self) -> Receiver<BridgeEvent> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_CAPACITY);
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Live subscriber count
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Fan an event out to every subscriber without blocking
    pub fn publish(&self, event: BridgeEvent) {
        lock(&self.subscribers).retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Publish a stats event if traffic changed since the last call
    pub fn publish_stats_if_changed(&self) -> bool {
        let current = self.traffic();
        let mut last = lock(&self.last_published);
        if *last == Some(current) {
            return false;
        }
        *last = Some(current);
        drop(last);
        self.publish(BridgeEvent::Stats(current));
        true
    }

    /// Consolidated one-line summary
    pub fn summary_line(&self) -> String {
        let stats = self.traffic();
        format!(
            "[STATS] RX: {} pkts, {} bytes | TX: {} pkts, {} bytes | Serial: {} | Idle: {:.1}s",
            stats.packets_rx,
            stats.bytes_rx,
            stats.packets_tx,
            stats.bytes_tx,
            if self.is_connected() { "OPEN" } else { "CLOSED" },
            self.idle().as_secs_f64()
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Periodic summary and stats-feed publisher
#[derive(Debug)]
pub struct Reporter {
    telemetry: Arc<Telemetry>,
    udp_port: u16,
    interval: Duration,
    tick: Duration,
}

impl Reporter {
    /// Reporter with the standard 10 s summary interval
    pub fn new(telemetry: Arc<Telemetry>, udp_port: u16) -> Self {
        Self {
            telemetry,
            udp_port,
            interval: STATS_INTERVAL,
            tick: STATS_TICK,
        }
    }

    /// Override the summary interval and feed tick
    pub fn with_timing(mut self, interval: Duration, tick: Duration) -> Self {
        self.interval = interval;
        self.tick = tick;
        self
    }

    /// Emit one summary line, plus an idle notice when traffic has stalled
    pub fn report(&self) {
        self.telemetry.log(Severity::Info, self.telemetry.summary_line());

        let idle = self.telemetry.idle();
        if self.telemetry.traffic().packets_tx > 0 && idle > IDLE_NOTICE_AFTER {
            self.telemetry.log(
                Severity::Quiet,
                format!(
                    "[INFO] No activity for {:.1}s - waiting for DDP packets on UDP port {}",
                    idle.as_secs_f64(),
                    self.udp_port
                ),
            );
        }
    }

    /// Run until `shutdown` is set
    pub fn run(&self, shutdown: &AtomicBool) {
        let mut next_report = Instant::now() + self.interval;
        while !shutdown.load(Ordering::Relaxed) {
            thread::sleep(self.tick);
            self.telemetry.publish_stats_if_changed();
            if Instant::now() >= next_report {
                self.report();
                next_report += self.interval;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let telemetry = Telemetry::new("/dev/null");
        telemetry.record_datagram(139);
        telemetry.record_datagram(10);
        telemetry.record_sent(139);
        telemetry.record_serial_bytes(5);
        telemetry.record_parse_error();

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.packets_received, 2);
        assert_eq!(snapshot.bytes_received, 154);
        assert_eq!(snapshot.packets_sent, 1);
        assert_eq!(snapshot.bytes_sent, 139);
        assert_eq!(snapshot.parse_errors, 1);
    }

    #[test]
    fn test_log_ring_evicts_oldest() {
        let telemetry = Telemetry::with_capacity("port", 3);
        for i in 0..5 {
            telemetry.log(Severity::Quiet, format!("entry {}", i));
        }
        let messages: Vec<_> = telemetry
            .recent_events()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn test_default_log_capacity() {
        let telemetry = Telemetry::new("port");
        for i in 0..150 {
            telemetry.log(Severity::Quiet, i.to_string());
        }
        let events = telemetry.recent_events();
        assert_eq!(events.len(), 100);
        assert_eq!(events[0].message, "50");
    }

    #[test]
    fn test_subscriber_receives_events() {
        let telemetry = Telemetry::new("/dev/ttyACM0");
        let rx = telemetry.subscribe();

        telemetry.log(Severity::Info, "hello");
        telemetry.set_connected(true);
        telemetry.set_connected(true);
        telemetry.record_sent(3);
        assert!(telemetry.publish_stats_if_changed());
        assert!(!telemetry.publish_stats_if_changed());

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], BridgeEvent::Log(e) if e.message == "hello"));
        assert_eq!(
            events[1],
            BridgeEvent::Status {
                connected: true,
                serial_port: "/dev/ttyACM0".into()
            }
        );
        assert!(matches!(events[2], BridgeEvent::Stats(s) if s.packets_tx == 1 && s.bytes_tx == 3));
    }

    #[test]
    fn test_slow_subscriber_does_not_block() {
        let telemetry = Telemetry::new("port");
        let _slow = telemetry.subscribe();
        let fast = telemetry.subscribe();

        for i in 0..(SUBSCRIBER_CAPACITY + 10) {
            telemetry.log(Severity::Quiet, i.to_string());
            // Keep draining one subscriber only
            while fast.try_recv().is_ok() {}
        }
        assert_eq!(telemetry.subscriber_count(), 2);
    }

    #[test]
    fn test_disconnected_subscriber_pruned() {
        let telemetry = Telemetry::new("port");
        let rx = telemetry.subscribe();
        drop(rx);
        telemetry.log(Severity::Quiet, "x");
        assert_eq!(telemetry.subscriber_count(), 0);
    }

    #[test]
    fn test_event_json_shape() {
        let log = BridgeEvent::Log(EventLogEntry {
            message: "m".into(),
            timestamp: "t".into(),
        });
        let value: serde_json::Value = serde_json::from_str(&log.to_json()).unwrap();
        assert_eq!(value["type"], "log");
        assert_eq!(value["message"], "m");

        let stats = BridgeEvent::Stats(TrafficStats {
            packets_rx: 1,
            ..Default::default()
        });
        let value: serde_json::Value = serde_json::from_str(&stats.to_json()).unwrap();
        assert_eq!(value["type"], "stats");
        assert_eq!(value["packets_rx"], 1);

        let status = BridgeEvent::Status {
            connected: false,
            serial_port: "p".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&status.to_json()).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["connected"], false);
    }

    #[test]
    fn test_summary_line() {
        let telemetry = Telemetry::new("port");
        telemetry.record_datagram(100);
        let line = telemetry.summary_line();
        assert!(line.starts_with(
            "[STATS] RX: 1 pkts, 100 bytes | TX: 0 pkts, 0 bytes | Serial: CLOSED"
        ));
    }

    #[test]
    fn test_reporter_stops_on_shutdown() {
        let telemetry = Arc::new(Telemetry::new("port"));
        let rx = telemetry.subscribe();
        telemetry.record_datagram(4);

        let shutdown = Arc::new(AtomicBool::new(false));
        let reporter = Reporter::new(Arc::clone(&telemetry), 4048)
            .with_timing(Duration::from_millis(5), Duration::from_millis(1));
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || reporter.run(&shutdown))
        };

        thread::sleep(Duration::from_millis(50));
        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, BridgeEvent::Stats(s) if s.packets_rx == 1)));
        assert!(events
            .iter()
            .any(|e| matches!(e, BridgeEvent::Log(entry) if entry.message.starts_with("[STATS]"))));
    }
}
