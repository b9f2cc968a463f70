//! Error types for bridge operations

use std::net::SocketAddr;

/// Errors raised while parsing a DDP datagram
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Datagram shorter than the fixed header
    #[error("Datagram too short: {actual} bytes, header needs {expected}")]
    TooShort {
        /// Header size.
        expected: usize,
        /// Bytes actually received.
        actual: usize,
    },

    /// Declared payload length exceeds the bytes that follow the header
    #[error("Length mismatch: header declares {declared} bytes, only {available} follow")]
    LengthMismatch {
        /// Length field from the header.
        declared: usize,
        /// Bytes present after the header.
        available: usize,
    },
}

/// Errors raised at the settings boundary
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    /// Body was not valid JSON
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Body was valid JSON but not an object
    #[error("Settings payload must be a JSON object")]
    NotAnObject,

    /// A field carried a value of the wrong type
    #[error("Invalid value for {field}: expected {expected}")]
    InvalidField {
        /// Offending field name.
        field: &'static str,
        /// Description of the accepted type.
        expected: &'static str,
    },
}

/// Errors raised while loading or validating startup configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Config file was not valid TOML for this schema
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its accepted range
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Top-level bridge errors; all of these are fatal at startup
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    /// IO error during setup
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial device could not be opened
    #[error("Serial port {port} unavailable: {source}")]
    Serial {
        /// Device path.
        port: String,
        /// Driver error.
        source: serialport::Error,
    },

    /// No serial device given and none detected
    #[error("No serial port found")]
    NoSerialPort,

    /// UDP socket could not be bound
    #[error("UDP bind to {addr} failed: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: SocketAddr,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<serialport::Error> for BridgeError {
    fn from(err: serialport::Error) -> Self {
        BridgeError::Serial {
            port: String::from("<unknown>"),
            source: err,
        }
    }
}
