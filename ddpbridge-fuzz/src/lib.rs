//! Fuzz entry points for the ddpbridge-core decoders
//!
//! Each function takes arbitrary bytes and must never panic. They are plain
//! functions so any harness (cargo-fuzz, AFL, a proptest loop) can drive
//! them.

use ddpbridge_core::{
    cobs::{self, FrameSplitter},
    packet,
    transport::LineScanner,
};

/// Decode a single COBS block
pub fn fuzz_cobs_decode(data: &[u8]) {
    let decoded = cobs::decode(data);
    assert!(decoded.len() <= data.len());
}

/// Parse a datagram as a DDP packet, checking the payload bound on success
pub fn fuzz_parse(data: &[u8]) {
    if let Ok(parsed) = packet::parse(data) {
        assert_eq!(parsed.pixel_data.len(), parsed.length as usize);
        let _ = parsed.summary();
        let _ = packet::is_full_frame_update(&parsed, 43);
    }
}

/// Split a stream fed in uneven chunks, parsing every frame
pub fn fuzz_splitter(data: &[u8]) {
    let mut splitter = FrameSplitter::new();
    let chunk = usize::from(data.first().copied().unwrap_or(1)).max(1);
    for piece in data.chunks(chunk) {
        for frame in splitter.push(piece) {
            fuzz_parse(&frame);
        }
    }
}

/// Feed the serial diagnostic scanner
pub fn fuzz_line_scanner(data: &[u8]) {
    let mut scanner = LineScanner::default();
    for line in scanner.feed(data) {
        assert!(line.starts_with("[DDPico]"));
    }
}
