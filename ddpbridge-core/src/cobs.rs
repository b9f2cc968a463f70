//! COBS framing for the serial byte stream
//!
//! Every frame on the wire is the COBS-stuffed packet followed by a single
//! `0x00` delimiter. Stuffing guarantees the delimiter never appears inside
//! a frame, so a reader can resynchronise on the next zero byte after any
//! corruption.

use crate::constants::{FRAME_DELIMITER, MAX_FRAME_SIZE};
use bytes::{BufMut, Bytes, BytesMut};

/// Longest run of non-zero bytes one code byte can cover
const MAX_RUN: usize = 254;

/// Code byte marking a full run with no implicit zero
const FULL_RUN_CODE: u8 = 0xFF;

/// Worst-case encoded size of `len` input bytes, delimiter included
pub const fn max_encoded_len(len: usize) -> usize {
    len + len / MAX_RUN + 2
}

/// Encode a frame, appending the trailing delimiter
///
/// The output never contains `0x00` except as its final byte. An empty
/// input encodes to `[0x01, 0x00]`.
pub fn encode(data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(max_encoded_len(data.len()));

    let mut code_idx = 0;
    let mut code: u8 = 1;
    buf.put_u8(0);

    for &byte in data {
        if byte == 0 {
            buf[code_idx] = code;
            code_idx = buf.len();
            buf.put_u8(0);
            code = 1;
        } else {
            buf.put_u8(byte);
            code += 1;
            if code == FULL_RUN_CODE {
                buf[code_idx] = code;
                code_idx = buf.len();
                buf.put_u8(0);
                code = 1;
            }
        }
    }

    buf[code_idx] = code;
    buf.put_u8(FRAME_DELIMITER);
    buf.freeze()
}

/// Decode one framed block
///
/// The trailing delimiter is optional. Decoding stops at the first zero
/// code byte or when input runs out. Truncated or malformed input is not
/// an error: whatever was reconstructed up to that point is returned.
pub fn decode(framed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(framed.len());
    let mut pos = 0;

    while pos < framed.len() {
        let code = framed[pos];
        pos += 1;

        if code == FRAME_DELIMITER {
            break;
        }

        let end = (pos + code as usize - 1).min(framed.len());
        out.extend_from_slice(&framed[pos..end]);
        pos = end;

        if code < FULL_RUN_CODE && pos < framed.len() && framed[pos] != FRAME_DELIMITER {
            out.push(0);
        }
    }

    out
}

/// Splits a continuous byte stream into decoded frames
///
/// Feed arbitrary chunks with [`FrameSplitter::push`]; every complete
/// delimited block is decoded and returned. A block that grows past the
/// size limit is dropped up to its delimiter.
#[derive(Debug)]
pub struct FrameSplitter {
    buf: Vec<u8>,
    max_frame: usize,
    discarding: bool,
    overflows: usize,
}

impl FrameSplitter {
    /// Create a splitter with the device's frame size limit
    pub fn new() -> Self {
        Self::with_max_frame(MAX_FRAME_SIZE)
    }

    /// Create a splitter with a custom size limit for encoded blocks
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame,
            discarding: false,
            overflows: 0,
        }
    }

    /// Consume a chunk, returning the frames it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut rest = chunk;

        while let Some(idx) = memchr::memchr(FRAME_DELIMITER, rest) {
            self.accumulate(&rest[..idx]);
            if !self.discarding && !self.buf.is_empty() {
                let frame = decode(&self.buf);
                if !frame.is_empty() {
                    frames.push(frame);
                }
            }
            self.buf.clear();
            self.discarding = false;
            rest = &rest[idx + 1..];
        }

        self.accumulate(rest);
        frames
    }

    /// Bytes buffered for the block in progress
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Number of blocks dropped for exceeding the size limit
    pub fn overflows(&self) -> usize {
        self.overflows
    }

    fn accumulate(&mut self, bytes: &[u8]) {
        if self.discarding {
            return;
        }
        if self.buf.len() + bytes.len() > self.max_frame {
            self.buf.clear();
            self.discarding = true;
            self.overflows += 1;
            return;
        }
        self.buf.extend_from_slice(bytes);
    }
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty() {
        assert_eq!(&encode(&[])[..], &[0x01, 0x00]);
        assert!(decode(&[0x01, 0x00]).is_empty());
    }

    #[test]
    fn test_encode_known_vectors() {
        assert_eq!(&encode(&[0x00])[..], &[0x01, 0x01, 0x00]);
        assert_eq!(&encode(&[0x00, 0x00])[..], &[0x01, 0x01, 0x01, 0x00]);
        assert_eq!(
            &encode(&[0x11, 0x22, 0x00, 0x33])[..],
            &[0x03, 0x11, 0x22, 0x02, 0x33, 0x00]
        );
        assert_eq!(&encode(&[0x11, 0x00])[..], &[0x02, 0x11, 0x01, 0x00]);
    }

    #[test]
    fn test_round_trip_with_zeros() {
        let data = [0u8, 1, 0, 0, 2, 3, 0];
        assert_eq!(decode(&encode(&data)), data);
    }

    #[test]
    fn test_exact_full_run() {
        let data: Vec<u8> = (0..254).map(|i| (i % 255) as u8 + 1).collect();
        let encoded = encode(&data);

        assert_eq!(encoded[0], 0xFF);
        // Full run, then an empty trailing run before the delimiter
        assert_eq!(&encoded[255..], &[0x01, 0x00]);
        assert_eq!(decode(&encoded), data);
    }

    #[test]
    fn test_long_run_splits() {
        let data = vec![0xAB; 300];
        let encoded = encode(&data);

        assert_eq!(encoded[0], 0xFF);
        assert_eq!(encoded[255], (300 - 254 + 1) as u8);
        assert_eq!(encoded.len(), 300 + 2 + 1);
        assert_eq!(decode(&encoded), data);
    }

    #[test]
    fn test_decode_without_delimiter() {
        let encoded = encode(&[1, 2, 0, 3]);
        let trimmed = &encoded[..encoded.len() - 1];
        assert_eq!(decode(trimmed), vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_decode_truncated_is_tolerant() {
        // Code promises 5 bytes but only 2 follow
        assert_eq!(decode(&[0x06, 0x10, 0x20]), vec![0x10, 0x20]);
        // Stops at a zero code byte
        assert_eq!(decode(&[0x02, 0x10, 0x00, 0x02, 0x20]), vec![0x10]);
        assert!(decode(&[]).is_empty());
    }

    #[test]
    fn test_max_encoded_len_bounds_output() {
        for len in [0usize, 1, 253, 254, 255, 508, 1000] {
            let data = vec![0x42; len];
            assert!(encode(&data).len() <= max_encoded_len(len));
        }
    }

    #[test]
    fn test_splitter_across_chunks() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode(b"first"));
        stream.extend_from_slice(&encode(&[0, 1, 0]));

        let mut splitter = FrameSplitter::new();
        let mut frames = splitter.push(&stream[..4]);
        assert!(frames.is_empty());
        frames.extend(splitter.push(&stream[4..]));

        assert_eq!(frames, vec![b"first".to_vec(), vec![0, 1, 0]]);
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn test_splitter_skips_empty_blocks() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.push(&[0x00, 0x00, 0x02, 0x07, 0x00]);
        assert_eq!(frames, vec![vec![0x07]]);
    }

    #[test]
    fn test_splitter_drops_oversized_block() {
        let mut splitter = FrameSplitter::with_max_frame(8);
        let mut stream = vec![0x05; 20];
        stream.push(0x00);
        stream.extend_from_slice(&encode(b"ok"));

        let frames = splitter.push(&stream);
        assert_eq!(frames, vec![b"ok".to_vec()]);
        assert_eq!(splitter.overflows(), 1);
    }
}
