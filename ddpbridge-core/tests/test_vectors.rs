//! Known-answer vectors for the COBS framing and the DDP header
//!
//! Each vector pairs an input with the exact bytes the controller firmware
//! expects on the wire.

use ddpbridge_core::{cobs, packet, pattern::TestPattern};

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s.replace(' ', "")).unwrap()
}

/// (raw packet, framed bytes)
const COBS_VECTORS: &[(&str, &str)] = &[
    ("", "01 00"),
    ("00", "01 01 00"),
    ("00 00", "01 01 01 00"),
    ("11 22 00 33", "03 11 22 02 33 00"),
    ("11 22 33 44", "05 11 22 33 44 00"),
    ("11 00 00 00", "02 11 01 01 01 00"),
];

#[test]
fn test_cobs_vectors() {
    for (raw, framed) in COBS_VECTORS {
        let raw = unhex(raw);
        let framed = unhex(framed);
        assert_eq!(&cobs::encode(&raw)[..], &framed[..], "encode {}", hex::encode(&raw));
        assert_eq!(cobs::decode(&framed), raw, "decode {}", hex::encode(&framed));
    }
}

#[test]
fn test_cobs_long_runs() {
    // 254 non-zero bytes fill one block exactly
    let run: Vec<u8> = (1..=254).map(|i| i as u8).collect();
    let framed = cobs::encode(&run);
    assert_eq!(framed[0], 0xFF);
    assert_eq!(&framed[1..255], &run[..]);
    assert_eq!(&framed[255..], &[0x01, 0x00]);

    // 300 bytes split into a full block and a 46-byte tail
    let run = vec![0xAB; 300];
    let framed = cobs::encode(&run);
    assert_eq!(framed.len(), 1 + 254 + 1 + 46 + 1);
    assert_eq!(framed[0], 0xFF);
    assert_eq!(framed[255], 47);
    assert_eq!(cobs::decode(&framed), run);
}

#[test]
fn test_ddp_header_vectors() {
    assert_eq!(
        hex::encode(packet::build(0, &[], true)),
        "41000101000000000000"
    );
    assert_eq!(
        hex::encode(packet::build(3, &[0xFF, 0x00, 0x80], false)),
        "40030101000000000003ff0080"
    );
    // Sequence wraps into the low nibble
    assert_eq!(
        hex::encode(packet::build(17, &[1, 2, 3], true)),
        "41010101000000000003010203"
    );
}

#[test]
fn test_parse_captured_datagram() {
    // Header as sent by common DDP senders: timecode clear, push set
    let raw = unhex("41 0A 01 01 00 00 00 00 00 06 10 20 30 40 50 60 FF FF");
    let parsed = packet::parse(&raw).unwrap();

    assert_eq!(parsed.flags.version(), 1);
    assert!(parsed.push());
    assert_eq!(parsed.sequence, 10);
    assert_eq!(parsed.length, 6);
    // Trailing bytes past the declared length are ignored
    assert_eq!(&parsed.pixel_data[..], &unhex("10 20 30 40 50 60")[..]);
    assert!(packet::is_full_frame_update(&parsed, 2));
    assert!(!packet::is_full_frame_update(&parsed, 3));
}

#[test]
fn test_pattern_first_packet_on_the_wire() {
    let packets = TestPattern::new(1).packets();
    let framed = cobs::encode(&packets[0]);
    // Red: 41 00 01 01 00000000 0003 FF 00 00
    assert_eq!(
        hex::encode(&framed),
        "0241030101010101010303ff010100"
    );
}
