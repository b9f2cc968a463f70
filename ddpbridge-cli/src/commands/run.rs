use anyhow::{Context, Result};
use ddpbridge_core::{Bridge, BridgeConfig};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use tracing::info;

/// Options for the `run` subcommand; flags override the config file
#[derive(Debug, Default, Clone, clap::Args)]
pub struct RunOptions {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serial device (auto-detected when omitted)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// UDP port to listen on
    #[arg(short, long)]
    pub udp_port: Option<u16>,

    /// Number of LEDs on the device
    #[arg(short, long)]
    pub leds: Option<usize>,

    /// Enable tweening between keyframes
    #[arg(long)]
    pub tweening: bool,

    /// Tweening steps per keyframe (1-20)
    #[arg(long)]
    pub steps: Option<u8>,

    /// Tweening output rate (10-120)
    #[arg(long)]
    pub fps: Option<u16>,

    /// Send the colour test sweep after startup
    #[arg(long)]
    pub test_pattern: bool,
}

/// Merge the config file (if any) with command-line overrides
pub fn resolve_config(options: &RunOptions) -> Result<BridgeConfig> {
    let mut config = match &options.config {
        Some(path) => BridgeConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    if let Some(port) = &options.port {
        config.serial_port = Some(port.clone());
    }
    if let Some(baud) = options.baud {
        config.baud = baud;
    }
    if let Some(udp_port) = options.udp_port {
        config.udp_port = udp_port;
    }
    if let Some(leds) = options.leds {
        config.led_count = leds;
    }
    if options.tweening {
        config.tweening.tweening_enabled = true;
    }
    if let Some(steps) = options.steps {
        config.tweening.tweening_steps = steps;
    }
    if let Some(fps) = options.fps {
        config.tweening.target_fps = fps;
    }
    if options.test_pattern {
        config.test_pattern = true;
    }

    config.tweening = config.tweening.clamped();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn execute(options: &RunOptions) -> Result<()> {
    let config = resolve_config(options)?;
    info!(
        "Starting bridge: UDP {} -> {} LEDs, tweening {}",
        config.udp_port,
        config.led_count,
        if config.tweening.tweening_enabled { "on" } else { "off" }
    );

    let bridge = Bridge::new(config).context("Failed to configure bridge")?;
    let shutdown = bridge.shutdown_flag();
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, std::sync::Arc::clone(&shutdown))
            .with_context(|| format!("Failed to install handler for signal {}", signal))?;
    }

    let port = bridge.serial_port().to_string();
    let running = bridge
        .start()
        .with_context(|| format!("Failed to start bridge on {}", port))?;

    running.wait();
    Ok(())
}
