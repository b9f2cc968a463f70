//! # DDP Bridge Core
//!
//! Receives DDP pixel datagrams over UDP and forwards them to an LED
//! controller over a serial link, COBS-framed, optionally smoothing between
//! keyframes with interpolated frames.
//!
//! ## Modules
//!
//! - `constants`: Protocol constants, limits and timings
//! - `error`: Error types
//! - `cobs`: COBS frame encoding, decoding and stream splitting
//! - `packet`: DDP header parsing and building
//! - `queue`: Bounded drop-oldest ingress queue
//! - `pixels`: Keyframe store and interpolation
//! - `settings`: Runtime tweening settings
//! - `telemetry`: Counters, event log, event feed and periodic reporter
//! - `receiver`: UDP listener
//! - `transport`: Serial writer, diagnostic reader and port discovery
//! - `dispatch`: Queue consumer driving the serial writer
//! - `config`: Startup configuration
//! - `pattern`: Startup colour sweep
//! - `bridge`: Thread orchestration

#![warn(missing_docs)]

pub mod bridge;
pub mod cobs;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod packet;
pub mod pattern;
pub mod pixels;
pub mod queue;
pub mod receiver;
pub mod settings;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types
pub use bridge::{Bridge, RunningBridge};
pub use config::BridgeConfig;
pub use error::{BridgeError, ConfigError, ParseError, SettingsError};
pub use packet::PixelUpdatePacket;
pub use pixels::PixelFrame;
pub use settings::{BridgeSettings, SharedSettings};
pub use telemetry::{BridgeEvent, Telemetry};

/// Result type alias for bridge operations
pub type Result<T> = core::result::Result<T, BridgeError>;
