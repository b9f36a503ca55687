//! Unified error types for the fan control daemon.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's cycle-boundary error handling uniform.  Subsystem variants
//! are `Copy` so they can be passed through the loop and event sink without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the daemon funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A temperature source could not be read or returned garbage.
    Sensor(SensorError),
    /// A fan register read or write failed.
    Actuator(ActuatorError),
    /// A telemetry datagram could not be decoded.
    Telemetry(TelemetryError),
    /// Configuration is inconsistent with what the cycle needs.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Telemetry(e) => write!(f, "telemetry: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No hwmon device with a known CPU driver name was found.
    NotFound,
    /// Reading the input file failed.
    ReadFailed,
    /// The file did not contain an integer.
    Parse,
    /// Reading is NaN or infinite.
    NonFinite,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no CPU hwmon device"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::Parse => write!(f, "unparseable reading"),
            Self::NonFinite => write!(f, "non-finite reading"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Register read failed.
    ReadFailed,
    /// Register write failed.
    WriteFailed,
    /// Register contents were not what the register should hold.
    Parse,
    /// Fan id has no configuration.
    UnknownFan,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "register read failed"),
            Self::WriteFailed => write!(f, "register write failed"),
            Self::Parse => write!(f, "unparseable register value"),
            Self::UnknownFan => write!(f, "unknown fan"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Telemetry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// Datagram is not UTF-8.
    NotUtf8,
    /// Datagram is not valid JSON.
    Json,
    /// Payload is valid JSON but not an object with numeric fields.
    Shape,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUtf8 => write!(f, "payload is not UTF-8"),
            Self::Json => write!(f, "payload is not valid JSON"),
            Self::Shape => write!(f, "payload has unexpected shape"),
        }
    }
}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
