use anyhow::Result;
use clap::{Parser, Subcommand};
use ddpbridge_cli::commands;
use ddpbridge_cli::RunOptions;
use ddpbridge_core::constants::{DEFAULT_BAUD, DEFAULT_LED_COUNT};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ddpbridge")]
#[command(
    about = "DDP Bridge - Forward DDP pixel data from UDP to a serial LED controller",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge until interrupted
    Run(RunOptions),

    /// List serial ports and the one auto-detection picks
    Ports,

    /// Send the colour test sweep and exit
    TestPattern {
        /// Serial device (auto-detected when omitted)
        #[arg(short, long)]
        port: Option<String>,

        /// Serial baud rate
        #[arg(short, long, default_value_t = DEFAULT_BAUD)]
        baud: u32,

        /// Number of LEDs on the device
        #[arg(short, long, default_value_t = DEFAULT_LED_COUNT)]
        leds: usize,
    },

    /// Inspect a captured serial stream
    Inspect {
        /// Capture file to inspect ("-" for stdin)
        #[arg(short, long)]
        input: String,

        /// Output JSON file for the report
        #[arg(short, long)]
        output: Option<String>,

        /// Show statistics only
        #[arg(long)]
        stats_only: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Run(options) => commands::run::execute(&options),

        Commands::Ports => commands::ports::execute(),

        Commands::TestPattern { port, baud, leds } => {
            commands::test_pattern::execute(port.as_deref(), baud, leds)
        }

        Commands::Inspect {
            input,
            output,
            stats_only,
        } => commands::inspect::execute(&input, output.as_deref(), stats_only),
    }
}
