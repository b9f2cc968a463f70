use anyhow::{Context, Result};
use colored::*;
use ddpbridge_core::{cobs::FrameSplitter, constants::DDP_SEQUENCE_MASK, packet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read};
use tracing::{info, warn};

/// Bytes of pixel data shown per frame
const PREVIEW_LEN: usize = 12;

/// One frame recovered from a captured serial stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectedFrame {
    pub index: usize,
    pub size: usize,
    pub flags: String,
    pub sequence: u8,
    pub push: bool,
    pub data_type: u8,
    pub destination_id: u8,
    pub offset: u32,
    pub length: u16,
    pub preview: String,
}

/// Counters over a whole capture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectStats {
    pub bytes_scanned: usize,
    pub frames_found: usize,
    pub valid_packets: usize,
    pub parse_failures: usize,
    pub oversized_frames: usize,
    pub pushes: usize,
    pub pixel_bytes: usize,
    /// Consecutive packets whose sequence did not advance by one
    pub sequence_gaps: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectReport {
    pub stats: InspectStats,
    pub frames: Vec<InspectedFrame>,
}

/// Split a captured byte stream into frames and parse each DDP header
pub fn inspect_stream(data: &[u8]) -> InspectReport {
    let mut splitter = FrameSplitter::new();
    let blocks = splitter.push(data);

    let mut report = InspectReport::default();
    report.stats.bytes_scanned = data.len();
    report.stats.frames_found = blocks.len();
    report.stats.oversized_frames = splitter.overflows();

    let mut last_sequence: Option<u8> = None;
    for (index, block) in blocks.iter().enumerate() {
        let parsed = match packet::parse(block) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Frame {} ({} bytes) is not a DDP packet: {}", index, block.len(), e);
                report.stats.parse_failures += 1;
                continue;
            }
        };

        if let Some(last) = last_sequence {
            if parsed.sequence != (last + 1) & DDP_SEQUENCE_MASK {
                report.stats.sequence_gaps += 1;
            }
        }
        last_sequence = Some(parsed.sequence);

        report.stats.valid_packets += 1;
        report.stats.pixel_bytes += parsed.pixel_data.len();
        if parsed.push() {
            report.stats.pushes += 1;
        }

        let preview_len = parsed.pixel_data.len().min(PREVIEW_LEN);
        report.frames.push(InspectedFrame {
            index,
            size: block.len(),
            flags: format!("0x{:02X}", parsed.flags.as_u8()),
            sequence: parsed.sequence,
            push: parsed.push(),
            data_type: parsed.data_type,
            destination_id: parsed.destination_id,
            offset: parsed.offset,
            length: parsed.length,
            preview: hex::encode(&parsed.pixel_data[..preview_len]),
        });
    }

    report
}

pub fn execute(input: &str, output: Option<&str>, stats_only: bool) -> Result<()> {
    info!("Inspecting capture: {}", input);

    // Read input file or stdin
    let data = if input == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(input).with_context(|| format!("Failed to read input file: {}", input))?
    };

    let report = inspect_stream(&data);
    let stats = &report.stats;

    println!("\n=== Inspect Results ===");
    println!("Bytes scanned:     {} bytes", stats.bytes_scanned);
    println!("Frames found:      {}", stats.frames_found);
    println!("Valid packets:     {}", stats.valid_packets.to_string().green());
    if stats.parse_failures > 0 {
        println!("Parse failures:    {}", stats.parse_failures.to_string().red());
    } else {
        println!("Parse failures:    {}", stats.parse_failures);
    }
    println!("Oversized frames:  {}", stats.oversized_frames);
    println!("Pushes:            {}", stats.pushes);
    println!("Pixel bytes:       {} bytes", stats.pixel_bytes);
    println!("Sequence gaps:     {}", stats.sequence_gaps);
    println!();

    if stats_only {
        return Ok(());
    }

    if let Some(output_path) = output {
        let json = serde_json::to_string_pretty(&report)
            .with_context(|| "Failed to serialize inspect report")?;

        fs::write(output_path, json)
            .with_context(|| format!("Failed to write output file: {}", output_path))?;

        info!("Inspect report written to: {}", output_path);
    } else {
        println!("=== Frames ===");
        for frame in &report.frames {
            println!(
                "#{:<5} seq={:<2} flags={} offset={} len={}{} {}",
                frame.index,
                frame.sequence,
                frame.flags,
                frame.offset,
                frame.length,
                if frame.push { " push" } else { "" },
                frame.preview
            );
        }
    }

    Ok(())
}
