use anyhow::{Context, Result};
use ddpbridge_core::{
    pattern::TestPattern,
    telemetry::Telemetry,
    transport::{self, SerialWriter},
    BridgeConfig,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Validate the command-line values the same way `run` does
pub fn resolve_config(port: Option<&str>, baud: u32, leds: usize) -> Result<BridgeConfig> {
    let config = BridgeConfig {
        serial_port: port.map(str::to_string),
        baud,
        led_count: leds,
        ..Default::default()
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn execute(port: Option<&str>, baud: u32, leds: usize) -> Result<()> {
    let config = resolve_config(port, baud, leds)?;
    let port = match config.serial_port {
        Some(port) => port,
        None => transport::detect_port().context("Failed to auto-detect serial port")?,
    };
    info!(
        "Sending test pattern to {} ({} LEDs @ {} baud)",
        port, config.led_count, config.baud
    );

    let link = transport::open_link(&port, config.baud)
        .with_context(|| format!("Failed to open serial port: {}", port))?;

    let telemetry = Arc::new(Telemetry::new(port.clone()));
    let mut writer = SerialWriter::new(link.writer, Arc::clone(&telemetry));
    let sent = TestPattern::new(config.led_count).send(
        &mut writer,
        &telemetry,
        &AtomicBool::new(false),
    );

    let counters = telemetry.snapshot();
    println!("\n=== Test Pattern ===");
    println!("Packets sent:      {}", sent);
    println!("Bytes sent:        {} bytes", counters.bytes_sent);
    println!("Write errors:      {}", counters.write_errors);

    if counters.write_errors > 0 {
        let attempted = sent as u64 + counters.write_errors;
        anyhow::bail!("{} of {} packets failed to write", counters.write_errors, attempted);
    }
    Ok(())
}
