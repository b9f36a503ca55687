//! System configuration parameters
//!
//! All tunable parameters for the fan control daemon.  Loaded once at
//! startup (see [`ConfigPort`](crate::app::ports::ConfigPort)) and passed by
//! value into the control loop; nothing reads configuration from globals.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::control::curve::{CurvePoint, ThermalCurve};
use crate::control::hysteresis::Thresholds;

/// SMC fan index as exposed by the `fan{N}_*` registers.
pub type FanId = u8;

/// Default SMC sysfs root on a Mac Pro rack.
pub const DEFAULT_SMC_BASE: &str =
    "/sys/devices/LNXSYSTM:00/LNXSYBUS:00/PNP0A08:00/device:1f/APP0001:00";

/// Default hwmon class directory.
pub const DEFAULT_HWMON_BASE: &str = "/sys/class/hwmon";

/// Physical description of one zone-controlled fan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanConfig {
    pub id: FanId,
    pub name: String,
    pub min_rpm: u32,
    pub max_rpm: u32,
    /// Duty floor (0-100 %).
    pub min_percent: f64,
}

impl FanConfig {
    pub fn new(id: FanId, name: &str, min_rpm: u32, max_rpm: u32, min_percent: f64) -> Self {
        Self {
            id,
            name: name.to_owned(),
            min_rpm,
            max_rpm,
            min_percent,
        }
    }

    /// Linear duty → RPM over `[min_rpm, max_rpm]`, rounded to nearest.
    pub fn percent_to_rpm(&self, percent: f64) -> u32 {
        let span = f64::from(self.max_rpm) - f64::from(self.min_rpm);
        let rpm = f64::from(self.min_rpm) + (percent / 100.0) * span;
        rpm.round().max(0.0) as u32
    }

    /// Inverse of [`percent_to_rpm`](Self::percent_to_rpm), clamped to 0-100.
    pub fn rpm_to_percent(&self, rpm: u32) -> f64 {
        let span = f64::from(self.max_rpm) - f64::from(self.min_rpm);
        if span <= 0.0 {
            return 100.0;
        }
        let percent = (f64::from(rpm) - f64::from(self.min_rpm)) / span * 100.0;
        percent.clamp(0.0, 100.0)
    }

    /// Clamp an RPM target into the fan's physical range.
    pub fn clamp_rpm(&self, rpm: u32) -> u32 {
        rpm.clamp(self.min_rpm, self.max_rpm)
    }
}

/// Named heat source a zone can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatSource {
    Cpu,
    Gpu0,
    Gpu1,
    GpuMax,
}

/// Weighted blend of heat sources feeding one fan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneWeights {
    pub fan_id: FanId,
    pub weights: BTreeMap<HeatSource, f64>,
}

impl ZoneWeights {
    pub fn new(fan_id: FanId, weights: &[(HeatSource, f64)]) -> Self {
        Self {
            fan_id,
            weights: weights.iter().copied().collect(),
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Hardware ---
    /// Root of the SMC fan registers.  Missing root = simulation mode.
    pub smc_base: PathBuf,
    /// hwmon class directory scanned for the CPU sensor.
    pub hwmon_base: PathBuf,

    // --- Telemetry ---
    /// UDP endpoint the GPU telemetry listener binds to.
    pub listen_addr: SocketAddr,
    /// Receive timeout so the listener can observe a stop request (ms).
    pub recv_timeout_ms: u32,
    /// Telemetry older than this is stale (ms).
    pub gpu_stale_timeout_ms: u32,
    /// Use the GPUs' self-reported fan duty instead of the GPU curve.
    pub follow_gpu_fans: bool,

    // --- Timing ---
    /// Control loop period (ms).
    pub poll_interval_ms: u32,

    // --- Hysteresis ---
    pub hysteresis_up_c: f64,
    pub hysteresis_down_c: f64,

    // --- Safety ---
    /// Any temperature at or above this drives every fan to 100 %.
    pub emergency_temp_c: f64,
    /// Skip the hysteresis gate while the emergency condition holds.
    pub emergency_bypasses_hysteresis: bool,
    /// Substituted when the CPU sensor cannot be read.
    pub default_cpu_temp_c: f64,
    /// Substituted when GPU telemetry is stale or missing.
    pub default_gpu_temp_c: f64,
    /// Duty commanded after a cycle failure and on shutdown.
    pub safe_duty_percent: f64,

    // --- Fans and zones ---
    pub fans: Vec<FanConfig>,
    /// Fans handed back to firmware automatic control at startup.
    pub automatic_fans: Vec<FanId>,
    pub zones: Vec<ZoneWeights>,

    // --- Curves ---
    pub cpu_curve: ThermalCurve,
    pub gpu_curve: ThermalCurve,
}

impl Default for SystemConfig {
    fn default() -> Self {
        use HeatSource::{Cpu, Gpu0, Gpu1, GpuMax};

        Self {
            smc_base: PathBuf::from(DEFAULT_SMC_BASE),
            hwmon_base: PathBuf::from(DEFAULT_HWMON_BASE),

            listen_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 9999)),
            recv_timeout_ms: 1000,
            gpu_stale_timeout_ms: 10_000,
            follow_gpu_fans: true,

            poll_interval_ms: 500,

            hysteresis_up_c: 2.0,
            hysteresis_down_c: 2.0,

            emergency_temp_c: 85.0,
            emergency_bypasses_hysteresis: false,
            default_cpu_temp_c: 50.0,
            default_gpu_temp_c: 60.0,
            safe_duty_percent: 50.0,

            // Fan 1 (rear blower) stays under firmware control.
            fans: vec![
                FanConfig::new(2, "Right Front (GPU0)", 500, 2500, 20.0),
                FanConfig::new(3, "Middle Front (GPU1)", 500, 2500, 20.0),
                FanConfig::new(4, "Left Front (CPU)", 500, 2500, 20.0),
            ],
            automatic_fans: vec![1],
            zones: vec![
                ZoneWeights::new(2, &[(Gpu0, 0.70), (Gpu1, 0.20), (Cpu, 0.10)]),
                ZoneWeights::new(3, &[(Gpu1, 0.70), (Gpu0, 0.20), (Cpu, 0.10)]),
                ZoneWeights::new(4, &[(Cpu, 0.80), (GpuMax, 0.20)]),
            ],

            cpu_curve: ThermalCurve::new(vec![
                CurvePoint::new(30.0, 20.0),
                CurvePoint::new(40.0, 30.0),
                CurvePoint::new(50.0, 45.0),
                CurvePoint::new(60.0, 80.0),
                CurvePoint::new(65.0, 90.0),
                CurvePoint::new(80.0, 100.0),
            ]),
            gpu_curve: ThermalCurve::new(vec![
                CurvePoint::new(35.0, 20.0),
                CurvePoint::new(50.0, 30.0),
                CurvePoint::new(65.0, 50.0),
                CurvePoint::new(75.0, 75.0),
                CurvePoint::new(83.0, 100.0),
            ]),
        }
    }
}

impl SystemConfig {
    pub fn fan(&self, id: FanId) -> Option<&FanConfig> {
        self.fans.iter().find(|f| f.id == id)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.recv_timeout_ms))
    }

    pub fn gpu_stale_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.gpu_stale_timeout_ms))
    }

    pub fn hysteresis(&self) -> Thresholds {
        Thresholds {
            up_c: self.hysteresis_up_c,
            down_c: self.hysteresis_down_c,
        }
    }

    /// Effective settings as log lines: timing, safety, then one line per fan.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Poll interval {} ms, GPU stale timeout {} ms, receive timeout {} ms",
                self.poll_interval_ms, self.gpu_stale_timeout_ms, self.recv_timeout_ms
            ),
            format!(
                "Hysteresis +{:.1}/-{:.1}\u{00b0}C, emergency at {:.1}\u{00b0}C{}",
                self.hysteresis_up_c,
                self.hysteresis_down_c,
                self.emergency_temp_c,
                if self.emergency_bypasses_hysteresis {
                    " (bypasses hysteresis)"
                } else {
                    ""
                }
            ),
            format!(
                "Follow GPU fans: {}, fail-safe duty {:.0}%",
                if self.follow_gpu_fans { "on" } else { "off" },
                self.safe_duty_percent
            ),
        ];
        for fan in &self.fans {
            lines.push(format!(
                "Fan {} ({}): {}-{} RPM, floor {:.0}%",
                fan.id, fan.name, fan.min_rpm, fan.max_rpm, fan.min_percent
            ));
        }
        if !self.automatic_fans.is_empty() {
            let ids: Vec<String> = self.automatic_fans.iter().map(ToString::to_string).collect();
            lines.push(format!("Firmware automatic fans: {}", ids.join(", ")));
        }
        lines
    }
}

/// Range-check every field and cross-check zones against fans.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !(50..=10_000).contains(&cfg.poll_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "poll_interval_ms must be 50–10000",
        ));
    }
    if !(50..=10_000).contains(&cfg.recv_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "recv_timeout_ms must be 50–10000",
        ));
    }
    if cfg.gpu_stale_timeout_ms == 0 {
        return Err(ConfigError::ValidationFailed(
            "gpu_stale_timeout_ms must be > 0",
        ));
    }
    if !(0.0..=20.0).contains(&cfg.hysteresis_up_c) || !(0.0..=20.0).contains(&cfg.hysteresis_down_c)
    {
        return Err(ConfigError::ValidationFailed(
            "hysteresis thresholds must be 0.0–20.0",
        ));
    }
    if !(40.0..=120.0).contains(&cfg.emergency_temp_c) {
        return Err(ConfigError::ValidationFailed(
            "emergency_temp_c must be 40.0–120.0",
        ));
    }
    if !cfg.default_cpu_temp_c.is_finite() || !cfg.default_gpu_temp_c.is_finite() {
        return Err(ConfigError::ValidationFailed(
            "default temperatures must be finite",
        ));
    }
    if !(0.0..=100.0).contains(&cfg.safe_duty_percent) {
        return Err(ConfigError::ValidationFailed(
            "safe_duty_percent must be 0–100",
        ));
    }
    for fan in &cfg.fans {
        if fan.min_rpm >= fan.max_rpm {
            return Err(ConfigError::ValidationFailed(
                "fan min_rpm must be < max_rpm",
            ));
        }
        if !(0.0..=100.0).contains(&fan.min_percent) {
            return Err(ConfigError::ValidationFailed(
                "fan min_percent must be 0–100",
            ));
        }
        if cfg.automatic_fans.contains(&fan.id) {
            return Err(ConfigError::ValidationFailed(
                "a fan cannot be both zone-controlled and automatic",
            ));
        }
    }
    for (i, fan) in cfg.fans.iter().enumerate() {
        if cfg.fans[..i].iter().any(|f| f.id == fan.id) {
            return Err(ConfigError::ValidationFailed("duplicate fan id"));
        }
    }
    for (i, zone) in cfg.zones.iter().enumerate() {
        if cfg.zones[..i].iter().any(|z| z.fan_id == zone.fan_id) {
            return Err(ConfigError::ValidationFailed(
                "a fan can belong to only one zone",
            ));
        }
    }
    for zone in &cfg.zones {
        if cfg.fan(zone.fan_id).is_none() {
            return Err(ConfigError::ValidationFailed(
                "zone references a fan with no fan config",
            ));
        }
        if zone.weights.values().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(ConfigError::ValidationFailed(
                "zone weights must be 0.0–1.0",
            ));
        }
    }
    for curve in [&cfg.cpu_curve, &cfg.gpu_curve] {
        if curve
            .points()
            .iter()
            .any(|p| !p.temp_c.is_finite() || !(0.0..=100.0).contains(&p.percent))
        {
            return Err(ConfigError::ValidationFailed(
                "curve points need finite temperatures and percent 0–100",
            ));
        }
    }
    Ok(())
}
