//! Constants and limits for the DDP serial bridge

use std::time::Duration;

/// Size of the fixed DDP header in bytes
pub const DDP_HEADER_SIZE: usize = 10;

/// Largest pixel payload a single DDP packet carries (480 RGB pixels)
pub const DDP_MAX_DATA_LEN: usize = 1440;

/// Bytes per RGB pixel
pub const BYTES_PER_PIXEL: usize = 3;

/// Largest LED count whose full frame still fits one packet
pub const MAX_LED_COUNT: usize = DDP_MAX_DATA_LEN / BYTES_PER_PIXEL;

/// Data type byte for RGB pixel data
pub const DDP_TYPE_RGB: u8 = 0x01;

/// Destination ID used for every packet the bridge builds
pub const DDP_ID_DEFAULT: u8 = 0x01;

/// Sequence numbers occupy the low nibble of byte 1
pub const DDP_SEQUENCE_MASK: u8 = 0x0F;

/// Largest datagram the network receiver accepts
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Ingress queue capacity before the oldest frame is dropped
pub const INGRESS_QUEUE_CAPACITY: usize = 10;

/// Capacity of the rolling event log
pub const EVENT_LOG_CAPACITY: usize = 100;

/// Capacity of each event-feed subscriber channel
pub const SUBSCRIBER_CAPACITY: usize = 256;

/// Largest in-progress COBS block the stream splitter buffers (device frame buffer size)
pub const MAX_FRAME_SIZE: usize = 2048;

/// Serial reader resets its accumulator past this many bytes without a newline or delimiter
pub const MAX_SERIAL_LINE: usize = 4096;

/// COBS frame delimiter
pub const FRAME_DELIMITER: u8 = 0x00;

/// Prefix the device firmware puts on diagnostic text lines
pub const DIAGNOSTIC_PREFIX: &str = "[DDPico]";

/// Default UDP port DDP senders target
pub const DEFAULT_UDP_PORT: u16 = 4048;

/// Default serial baud rate (matches the device firmware)
pub const DEFAULT_BAUD: u32 = 921_600;

/// Default number of LEDs on the device
pub const DEFAULT_LED_COUNT: usize = 43;

/// Socket receive timeout so shutdown is observed promptly
pub const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial read timeout
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial write timeout
pub const SERIAL_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Serial reader idle delay when a read returns no data
pub const SERIAL_POLL_IDLE: Duration = Duration::from_millis(1);

/// Back-off after a non-timeout I/O error
pub const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Bounded wait used by the dispatch loop when the queue is empty
pub const DISPATCH_IDLE_WAIT: Duration = Duration::from_millis(100);

/// Interval between consolidated stats summaries
pub const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Interval at which the reporter publishes changed counters to subscribers
pub const STATS_TICK: Duration = Duration::from_millis(100);

/// Idle time after which the reporter notes that no DDP data is arriving
pub const IDLE_NOTICE_AFTER: Duration = Duration::from_secs(5);

/// Number of leading datagrams logged with a hex preview
pub const PREVIEW_PACKETS: u64 = 5;

/// Bytes shown in a datagram hex preview
pub const PREVIEW_BYTES: usize = 20;

/// Every Nth datagram is logged with its size and source
pub const RECEIVE_LOG_EVERY: u64 = 100;

/// Flags for a DDP packet (byte 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// Version bits (7-6)
    pub const VERSION_MASK: u8 = 0b1100_0000;

    /// Protocol version 1
    pub const VERSION_1: u8 = 0b0100_0000;

    /// Timecode present
    pub const TIMECODE: u8 = 0b0001_0000;

    /// Storage select
    pub const STORAGE: u8 = 0b0000_1000;

    /// Reply packet
    pub const REPLY: u8 = 0b0000_0100;

    /// Query packet
    pub const QUERY: u8 = 0b0000_0010;

    /// Push buffered data to the display
    pub const PUSH: u8 = 0b0000_0001;

    /// Create flags from the raw byte
    pub const fn new(flags: u8) -> Self {
        Self(flags)
    }

    /// Version 1 flags, with the push bit when requested
    pub const fn v1(push: bool) -> Self {
        Self(Self::VERSION_1 | if push { Self::PUSH } else { 0 })
    }

    /// Raw flags byte
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Protocol version encoded in bits 7-6
    pub const fn version(&self) -> u8 {
        (self.0 & Self::VERSION_MASK) >> 6
    }

    /// Check if the push bit is set
    pub const fn push(&self) -> bool {
        (self.0 & Self::PUSH) != 0
    }

    /// Check if a timecode follows the header
    pub const fn has_timecode(&self) -> bool {
        (self.0 & Self::TIMECODE) != 0
    }

    /// Check if the storage bit is set
    pub const fn storage(&self) -> bool {
        (self.0 & Self::STORAGE) != 0
    }

    /// Check if this is a reply
    pub const fn is_reply(&self) -> bool {
        (self.0 & Self::REPLY) != 0
    }

    /// Check if this is a query
    pub const fn is_query(&self) -> bool {
        (self.0 & Self::QUERY) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_flags() {
        assert_eq!(PacketFlags::v1(true).as_u8(), 0x41);
        assert_eq!(PacketFlags::v1(false).as_u8(), 0x40);
        assert_eq!(PacketFlags::v1(false).version(), 1);
    }

    #[test]
    fn test_flag_bits() {
        let flags = PacketFlags::new(0x40 | PacketFlags::QUERY | PacketFlags::TIMECODE);
        assert!(flags.is_query());
        assert!(flags.has_timecode());
        assert!(!flags.is_reply());
        assert!(!flags.storage());
        assert!(!flags.push());
    }

    #[test]
    fn test_max_led_count_fits_packet() {
        assert_eq!(MAX_LED_COUNT, 480);
        assert!(DEFAULT_LED_COUNT <= MAX_LED_COUNT);
    }

    #[test]
    fn test_worker_waits_within_shutdown_bound() {
        // Worker waits stay within one stats tick of a shutdown
        assert!(SERIAL_POLL_IDLE < SERIAL_READ_TIMEOUT);
        assert!(RECV_TIMEOUT <= STATS_TICK);
        assert!(DISPATCH_IDLE_WAIT <= STATS_TICK);
    }
}
