//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! Driven adapters (hwmon, UDP telemetry, SMC registers, log output, config
//! file) implement these traits.  The [`ControlLoop`](super::service::ControlLoop)
//! consumes them via generics, so the domain core never touches sysfs or
//! sockets directly.
//!
//! Port methods that talk to hardware never return errors: a failed read is
//! `None` and a failed write is `false`.  The adapter logs the cause.

use crate::config::{FanConfig, FanId, SystemConfig};
use crate::telemetry::{RemoteFanDuties, RemoteTemperatures};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware / network → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: every temperature and duty input of a cycle.
pub trait SensorPort {
    /// Local CPU temperature in °C, `None` if it could not be read.
    fn read_cpu_temp(&mut self) -> Option<f64>;

    /// Latest remote GPU temperatures with staleness.
    fn remote_temperatures(&self) -> RemoteTemperatures;

    /// Latest remote GPU fan duty with staleness.
    fn remote_fan_duties(&self) -> RemoteFanDuties;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → fan registers)
// ───────────────────────────────────────────────────────────────

/// Firmware control mode of a fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Manual,
    Automatic,
}

/// Write-side port: fan register access.
pub trait ActuatorPort {
    /// Current measured speed.
    fn read_speed(&self, fan: FanId) -> Option<u32>;

    /// Current control mode.
    fn read_mode(&self, fan: FanId) -> Option<FanMode>;

    /// Switch between manual and automatic control.  `true` on success.
    fn set_mode(&mut self, fan: FanId, manual: bool) -> bool;

    /// Write a target speed, clamped into the fan's physical range.
    fn command_rpm(&mut self, fan: FanId, rpm: u32) -> bool;

    /// `true` when no register root was found at startup.
    fn is_simulated(&self) -> bool;

    /// Clamp `percent` to `[min_percent, 100]`, convert to RPM and write it.
    /// Returns the RPM target and whether the write succeeded.
    fn command_percent(&mut self, fan: &FanConfig, percent: f64) -> (u32, bool) {
        let percent = percent.clamp(fan.min_percent, 100.0);
        let rpm = fan.percent_to_rpm(percent);
        (rpm, self.command_rpm(fan.id, rpm))
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ config file)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate with
/// [`validate_config`](crate::config::validate_config) on both paths and
/// reject invalid values rather than clamping them.
pub trait ConfigPort {
    /// Load configuration.  Returns [`SystemConfig::default()`] if nothing
    /// is stored.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found at the expected location.
    NotFound,
    /// Stored config failed to deserialize.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
