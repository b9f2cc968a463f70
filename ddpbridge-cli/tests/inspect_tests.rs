use std::fs;
use tempfile::tempdir;

use ddpbridge_cli::commands::inspect::{self, InspectReport};
use ddpbridge_core::{cobs, packet};

/// Helper: a serial capture of `count` pushed frames for `leds` LEDs
fn create_capture(count: u8, leds: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    for seq in 0..count {
        let pixels = vec![seq.wrapping_mul(10); leds * 3];
        stream.extend_from_slice(&cobs::encode(&packet::build(seq, &pixels, true)));
    }
    stream
}

#[test]
fn test_inspect_clean_capture() {
    let report = inspect::inspect_stream(&create_capture(20, 4));

    assert_eq!(report.stats.frames_found, 20);
    assert_eq!(report.stats.valid_packets, 20);
    assert_eq!(report.stats.parse_failures, 0);
    assert_eq!(report.stats.pushes, 20);
    assert_eq!(report.stats.pixel_bytes, 20 * 12);
    // Sequence wraps 15 -> 0 without counting as a gap
    assert_eq!(report.stats.sequence_gaps, 0);

    let frame = &report.frames[3];
    assert_eq!(frame.sequence, 3);
    assert_eq!(frame.flags, "0x41");
    assert_eq!(frame.length, 12);
    assert_eq!(frame.preview, "1e1e1e1e1e1e1e1e1e1e1e1e");
}

#[test]
fn test_inspect_counts_gaps_and_garbage() {
    let mut stream = create_capture(3, 1);
    // Short block that is not a DDP packet
    stream.extend_from_slice(&cobs::encode(&[0x41, 0x00, 0x01]));
    // Sequence jumps from 2 to 7
    stream.extend_from_slice(&cobs::encode(&packet::build(7, &[1, 2, 3], false)));
    // Truncated tail without delimiter
    stream.extend_from_slice(&[0x05, 0x41, 0x08]);

    let report = inspect::inspect_stream(&stream);
    assert_eq!(report.stats.frames_found, 5);
    assert_eq!(report.stats.valid_packets, 4);
    assert_eq!(report.stats.parse_failures, 1);
    assert_eq!(report.stats.sequence_gaps, 1);
    assert_eq!(report.stats.pushes, 3);
    assert_eq!(report.frames.last().unwrap().index, 4);
}

#[test]
fn test_inspect_writes_json_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("capture.bin");
    let output = dir.path().join("report.json");
    fs::write(&input, create_capture(5, 2)).unwrap();

    inspect::execute(
        input.to_str().unwrap(),
        Some(output.to_str().unwrap()),
        false,
    )
    .unwrap();

    let json = fs::read_to_string(&output).unwrap();
    let report: InspectReport = serde_json::from_str(&json).unwrap();
    assert_eq!(report.frames.len(), 5);
    assert_eq!(report.stats.bytes_scanned, fs::metadata(&input).unwrap().len() as usize);
}

#[test]
fn test_inspect_stats_only_skips_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("capture.bin");
    let output = dir.path().join("report.json");
    fs::write(&input, create_capture(2, 2)).unwrap();

    inspect::execute(
        input.to_str().unwrap(),
        Some(output.to_str().unwrap()),
        true,
    )
    .unwrap();
    assert!(!output.exists());
}

#[test]
fn test_inspect_missing_input_is_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.bin");
    assert!(inspect::execute(missing.to_str().unwrap(), None, true).is_err());
}
