//! Zone mixer: blends per-source duty into each fan's raw target.
//!
//! ```text
//!  cpu temp ──▶ cpu curve ───────────────┐
//!  gpu0 temp ─▶ gpu curve ─┐             │     ┌──────────┐
//!  gpu0 fan % ─(follow)────┴▶ gpu0 % ────┼────▶│ zone     │──▶ raw % ──▶ floor
//!  gpu1 temp ─▶ gpu curve ─┐             │     │ weights  │      ▲
//!  gpu1 fan % ─(follow)────┴▶ gpu1 % ────┤     └──────────┘      │
//!                           max ─▶ gpu_max                emergency → 100
//! ```
//!
//! The mixer is pure: it never touches hardware or time.  Hysteresis and
//! actuation happen in the control loop.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{FanId, HeatSource, SystemConfig, ZoneWeights};
use crate::control::curve::ThermalCurve;
use crate::error::{Error, Result, SensorError};

/// Where a GPU source's duty came from this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DutySource {
    /// Evaluated from the GPU thermal curve.
    Curve,
    /// Copied from the GPU's own fan controller.
    Follow,
}

/// Readings for one cycle, after default substitution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixInputs {
    pub cpu_temp: f64,
    pub gpu0_temp: f64,
    pub gpu1_temp: f64,
    pub gpu0_fan: Option<f64>,
    pub gpu1_fan: Option<f64>,
    /// Fan-duty telemetry is older than the stale timeout.
    pub fans_stale: bool,
}

impl MixInputs {
    /// Hottest reading in the system.
    pub fn max_temp(&self) -> f64 {
        self.cpu_temp.max(self.gpu0_temp).max(self.gpu1_temp)
    }
}

/// Per-source duty for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourcePercents {
    pub cpu: f64,
    pub gpu0: f64,
    pub gpu1: f64,
    pub gpu_max: f64,
    pub gpu0_source: DutySource,
    pub gpu1_source: DutySource,
}

impl SourcePercents {
    pub fn get(&self, source: HeatSource) -> f64 {
        match source {
            HeatSource::Cpu => self.cpu,
            HeatSource::Gpu0 => self.gpu0,
            HeatSource::Gpu1 => self.gpu1,
            HeatSource::GpuMax => self.gpu_max,
        }
    }
}

/// One fan's target before hysteresis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneTarget {
    pub fan_id: FanId,
    /// Weighted blend, or 100 under emergency.
    pub raw_percent: f64,
    /// `raw_percent` raised to the fan's duty floor.
    pub floored_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixOutput {
    pub percents: SourcePercents,
    pub emergency: bool,
    /// Shared hysteresis reference: the hottest reading in the system.
    pub reference_temp: f64,
    pub targets: Vec<ZoneTarget>,
}

/// Weighted sum of source percents.
pub fn blend(weights: &BTreeMap<HeatSource, f64>, values: &SourcePercents) -> f64 {
    weights
        .iter()
        .map(|(source, weight)| weight * values.get(*source))
        .sum()
}

pub struct ZoneMixer {
    cpu_curve: ThermalCurve,
    gpu_curve: ThermalCurve,
    follow_gpu_fans: bool,
    emergency_temp_c: f64,
    zones: Vec<ZoneWeights>,
    /// Duty floor per zone fan, resolved at construction.
    floors: BTreeMap<FanId, f64>,
}

impl ZoneMixer {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            cpu_curve: config.cpu_curve.clone(),
            gpu_curve: config.gpu_curve.clone(),
            follow_gpu_fans: config.follow_gpu_fans,
            emergency_temp_c: config.emergency_temp_c,
            zones: config.zones.clone(),
            floors: config.fans.iter().map(|f| (f.id, f.min_percent)).collect(),
        }
    }

    /// Per-source duty with the follow/curve choice made per source.
    pub fn source_percents(&self, inputs: &MixInputs) -> SourcePercents {
        let (gpu0, gpu0_source) =
            self.gpu_percent(inputs.gpu0_temp, inputs.gpu0_fan, inputs.fans_stale);
        let (gpu1, gpu1_source) =
            self.gpu_percent(inputs.gpu1_temp, inputs.gpu1_fan, inputs.fans_stale);
        SourcePercents {
            cpu: self.cpu_curve.evaluate(inputs.cpu_temp),
            gpu0,
            gpu1,
            gpu_max: gpu0.max(gpu1),
            gpu0_source,
            gpu1_source,
        }
    }

    pub fn is_emergency(&self, inputs: &MixInputs) -> bool {
        [inputs.cpu_temp, inputs.gpu0_temp, inputs.gpu1_temp]
            .iter()
            .any(|t| *t >= self.emergency_temp_c)
    }

    /// Run steps 1-7 of the cycle for every configured zone.
    pub fn mix(&self, inputs: &MixInputs) -> Result<MixOutput> {
        let percents = self.source_percents(inputs);
        let emergency = self.is_emergency(inputs);

        let mut targets = Vec::with_capacity(self.zones.len());
        for zone in &self.zones {
            let floor = *self
                .floors
                .get(&zone.fan_id)
                .ok_or(Error::Config("zone references a fan with no fan config"))?;

            let raw_percent = if emergency {
                100.0
            } else {
                blend(&zone.weights, &percents)
            };
            if raw_percent.is_nan() {
                return Err(SensorError::NonFinite.into());
            }
            // Overflowing blends saturate to full speed.
            let raw_percent = if raw_percent.is_infinite() { 100.0 } else { raw_percent };

            targets.push(ZoneTarget {
                fan_id: zone.fan_id,
                raw_percent,
                floored_percent: raw_percent.max(floor),
            });
        }

        Ok(MixOutput {
            percents,
            emergency,
            reference_temp: inputs.max_temp(),
            targets,
        })
    }

    fn gpu_percent(&self, temp: f64, fan: Option<f64>, stale: bool) -> (f64, DutySource) {
        match fan {
            Some(duty) if self.follow_gpu_fans && !stale => (duty, DutySource::Follow),
            _ => (self.gpu_curve.evaluate(temp), DutySource::Curve),
        }
    }
}
