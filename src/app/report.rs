//! Per-cycle report and change detection.
//!
//! A [`CycleReport`] captures every input and output of one control cycle.
//! Only the previous report is kept, and only so the next cycle can decide
//! what is worth logging.

use serde::Serialize;

use crate::config::FanId;
use crate::control::mixer::SourcePercents;

/// Temperature shift (°C) on any source that counts as a change.
pub const TEMP_CHANGE_C: f64 = 2.0;
/// Final duty shift (percentage points) that counts as a fan change.
pub const FAN_CHANGE_PERCENT: f64 = 5.0;

/// Temperatures used by a cycle, after substitution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempReport {
    pub cpu: f64,
    pub gpu0: f64,
    pub gpu1: f64,
    /// CPU sensor failed; `cpu` is the configured default.
    pub cpu_substituted: bool,
    /// GPU telemetry older than the stale timeout.
    pub gpu_stale: bool,
    pub gpu0_substituted: bool,
    pub gpu1_substituted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanReport {
    pub fan_id: FanId,
    pub name: String,
    /// Zone blend (or 100 under emergency), before floor and hysteresis.
    pub raw_percent: f64,
    /// Duty actually commanded.
    pub final_percent: f64,
    pub target_rpm: u32,
    /// Measured speed, `None` if the register could not be read.
    pub actual_rpm: Option<u32>,
    /// Whether the speed write succeeded.
    pub commanded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub temps: TempReport,
    pub percents: SourcePercents,
    pub emergency: bool,
    /// Hysteresis reference shared by every fan.
    pub reference_temp: f64,
    pub fans: Vec<FanReport>,
}

/// A fan whose final duty moved by at least [`FAN_CHANGE_PERCENT`].
#[derive(Debug, Clone, PartialEq)]
pub struct FanChange {
    pub fan_id: FanId,
    pub name: String,
    pub from_percent: f64,
    pub to_percent: f64,
    pub target_rpm: u32,
}

impl CycleReport {
    pub fn fan(&self, id: FanId) -> Option<&FanReport> {
        self.fans.iter().find(|f| f.fan_id == id)
    }

    /// Any source temperature moved by at least [`TEMP_CHANGE_C`].
    pub fn temps_changed(&self, prev: &Self) -> bool {
        let (a, b) = (&self.temps, &prev.temps);
        (a.cpu - b.cpu).abs() >= TEMP_CHANGE_C
            || (a.gpu0 - b.gpu0).abs() >= TEMP_CHANGE_C
            || (a.gpu1 - b.gpu1).abs() >= TEMP_CHANGE_C
    }

    /// Fans whose final duty moved enough to report.  A fan missing from
    /// `prev` is compared against 0 %.
    pub fn fan_changes(&self, prev: &Self) -> Vec<FanChange> {
        self.fans
            .iter()
            .filter_map(|fan| {
                let from = prev.fan(fan.fan_id).map_or(0.0, |f| f.final_percent);
                ((fan.final_percent - from).abs() >= FAN_CHANGE_PERCENT).then(|| FanChange {
                    fan_id: fan.fan_id,
                    name: fan.name.clone(),
                    from_percent: from,
                    to_percent: fan.final_percent,
                    target_rpm: fan.target_rpm,
                })
            })
            .collect()
    }
}
