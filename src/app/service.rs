//! Control loop: the hexagonal core.
//!
//! [`ControlLoop`] owns the mixer, the hysteresis filter and the loop
//! lifecycle.  All I/O flows through port traits passed in at call sites,
//! so the whole loop runs against mock adapters in tests.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!                 │        ControlLoop          │
//! ActuatorPort ◀──│ Mixer · Hysteresis · State  │
//!                 └────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Starting ──start()──▶ Running ◀──next cycle── DegradedOnError
//!                          │  cycle Err / panic ──────▲
//!                          └──shutdown()──▶ ShuttingDown
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use log::{debug, info};

use crate::config::{FanConfig, FanId, HeatSource, SystemConfig};
use crate::control::hysteresis::HysteresisFilter;
use crate::control::mixer::{MixInputs, ZoneMixer};
use crate::error::{Error, Result};

use super::events::AppEvent;
use super::ports::{ActuatorPort, EventSink, FanMode, SensorPort};
use super::report::{CycleReport, FanReport, TempReport};

/// Lifecycle state of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed; fan modes not yet claimed.
    Starting,
    /// Cycling normally.
    Running,
    /// The last cycle failed and every zone fan was sent to the safe duty.
    DegradedOnError,
    /// Stop requested; fans parked at the safe duty.
    ShuttingDown,
}

// ───────────────────────────────────────────────────────────────
// ControlLoop
// ───────────────────────────────────────────────────────────────

pub struct ControlLoop {
    config: SystemConfig,
    mixer: ZoneMixer,
    hysteresis: HysteresisFilter,
    state: LoopState,
    cycle_count: u64,
    /// Kept only for change detection.
    last_report: Option<CycleReport>,
}

impl ControlLoop {
    /// Build the loop from a validated configuration.
    ///
    /// Does **not** touch any fan; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        let mixer = ZoneMixer::new(&config);
        Self {
            config,
            mixer,
            hysteresis: HysteresisFilter::new(),
            state: LoopState::Starting,
            cycle_count: 0,
            last_report: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Claim manual control of every zone fan and hand the
    /// `automatic_fans` back to firmware, then enter `Running`.
    pub fn start(&mut self, fans: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started {
            fans: self.config.zones.len(),
            simulated: fans.is_simulated(),
        });

        for id in self.zone_fan_ids() {
            if fans.read_mode(id) != Some(FanMode::Manual) {
                let ok = fans.set_mode(id, true);
                sink.emit(&AppEvent::ModeChanged {
                    fan: id,
                    manual: true,
                    ok,
                });
            }
        }
        for &id in &self.config.automatic_fans {
            if fans.read_mode(id) == Some(FanMode::Manual) {
                let ok = fans.set_mode(id, false);
                sink.emit(&AppEvent::ModeChanged {
                    fan: id,
                    manual: false,
                    ok,
                });
            }
        }

        self.transition(LoopState::Running, sink);
        info!("Control loop started, {} zone fans", self.config.zones.len());
    }

    /// Run one cycle, containing any error or panic.
    ///
    /// On failure every zone fan is sent to `safe_duty_percent` and the
    /// loop enters `DegradedOnError`; the following call returns it to
    /// `Running` before cycling again.
    pub fn run_cycle(
        &mut self,
        sensors: &mut impl SensorPort,
        fans: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Option<CycleReport> {
        if self.state == LoopState::DegradedOnError {
            self.transition(LoopState::Running, sink);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.tick(sensors, fans, sink, Instant::now())
        }));

        match outcome {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                self.fail_safe(&format!("cycle failed: {e}"), fans, sink);
                None
            }
            Err(payload) => {
                let reason = format!("cycle panicked: {}", panic_message(payload.as_ref()));
                self.fail_safe(&reason, fans, sink);
                None
            }
        }
    }

    /// Enter `ShuttingDown` and park every zone fan at the safe duty.
    pub fn shutdown(&mut self, fans: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        self.transition(LoopState::ShuttingDown, sink);
        let percent = self.config.safe_duty_percent;
        self.command_all(percent, fans);
        sink.emit(&AppEvent::FailSafe {
            reason: "shutdown".into(),
            percent,
        });
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// One full cycle: read → substitute → mix → hysteresis → actuate → report.
    ///
    /// Errors propagate to the caller; [`run_cycle`](Self::run_cycle) is
    /// the boundary that contains them.
    pub fn tick(
        &mut self,
        sensors: &mut impl SensorPort,
        fans: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
        now: Instant,
    ) -> Result<CycleReport> {
        self.cycle_count += 1;

        // 1. Read and substitute
        let temps = self.read_temperatures(sensors, sink);
        let duties = sensors.remote_fan_duties();

        // 2. Mix
        let inputs = MixInputs {
            cpu_temp: temps.cpu,
            gpu0_temp: temps.gpu0,
            gpu1_temp: temps.gpu1,
            gpu0_fan: duties.gpu0,
            gpu1_fan: duties.gpu1,
            fans_stale: duties.stale,
        };
        let mixed = self.mixer.mix(&inputs)?;
        let bypass = mixed.emergency && self.config.emergency_bypasses_hysteresis;
        let thresholds = self.config.hysteresis();

        // 3. Hysteresis and actuation, one fan after another
        let mut reports = Vec::with_capacity(mixed.targets.len());
        for target in &mixed.targets {
            let fan = self
                .config
                .fan(target.fan_id)
                .ok_or(Error::Config("zone references a fan with no fan config"))?;

            let filtered = if bypass {
                self.hysteresis
                    .force(fan.id, mixed.reference_temp, 100.0, now)
            } else {
                self.hysteresis.apply(
                    fan.id,
                    mixed.reference_temp,
                    target.floored_percent,
                    thresholds,
                    now,
                )
            };

            let final_percent = filtered.clamp(fan.min_percent, 100.0);
            let (target_rpm, commanded) = fans.command_percent(fan, final_percent);
            let actual_rpm = fans.read_speed(fan.id);

            reports.push(FanReport {
                fan_id: fan.id,
                name: fan.name.clone(),
                raw_percent: target.raw_percent,
                final_percent,
                target_rpm,
                actual_rpm,
                commanded,
            });
        }

        let report = CycleReport {
            cycle: self.cycle_count,
            temps,
            percents: mixed.percents,
            emergency: mixed.emergency,
            reference_temp: mixed.reference_temp,
            fans: reports,
        };

        // 4. Report what changed
        self.emit_changes(&report, sink);
        self.last_report = Some(report.clone());
        Ok(report)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Cycles attempted since construction, failed ones included.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn hysteresis(&self) -> &HysteresisFilter {
        &self.hysteresis
    }

    // ── Internal ──────────────────────────────────────────────

    fn transition(&mut self, to: LoopState, sink: &mut impl EventSink) {
        let from = self.state;
        if from != to {
            self.state = to;
            sink.emit(&AppEvent::StateChanged { from, to });
        }
    }

    fn fail_safe(&mut self, reason: &str, fans: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        self.transition(LoopState::DegradedOnError, sink);
        let percent = self.config.safe_duty_percent;
        self.command_all(percent, fans);
        sink.emit(&AppEvent::FailSafe {
            reason: reason.to_owned(),
            percent,
        });
    }

    /// Write `percent` to every zone fan.  Failures are the adapter's to log.
    fn command_all(&self, percent: f64, fans: &mut impl ActuatorPort) {
        for fan in self.zone_fans() {
            let (rpm, ok) = fans.command_percent(fan, percent);
            debug!("Fan {} -> {} RPM (ok={})", fan.id, rpm, ok);
        }
    }

    fn zone_fan_ids(&self) -> Vec<FanId> {
        self.config.zones.iter().map(|z| z.fan_id).collect()
    }

    fn zone_fans(&self) -> impl Iterator<Item = &FanConfig> {
        self.config
            .zones
            .iter()
            .filter_map(|z| self.config.fan(z.fan_id))
    }

    fn read_temperatures(
        &self,
        sensors: &mut impl SensorPort,
        sink: &mut impl EventSink,
    ) -> TempReport {
        let cfg = &self.config;

        let cpu_reading = sensors.read_cpu_temp().filter(|t| t.is_finite());
        if cpu_reading.is_none() {
            sink.emit(&AppEvent::ReadingSubstituted {
                source: HeatSource::Cpu,
                default_c: cfg.default_cpu_temp_c,
            });
        }

        let remote = sensors.remote_temperatures();
        let usable = |t: Option<f64>| t.filter(|v| !remote.stale && v.is_finite());
        let (gpu0, gpu1) = (usable(remote.gpu0), usable(remote.gpu1));
        for (source, reading) in [(HeatSource::Gpu0, gpu0), (HeatSource::Gpu1, gpu1)] {
            if reading.is_none() {
                sink.emit(&AppEvent::ReadingSubstituted {
                    source,
                    default_c: cfg.default_gpu_temp_c,
                });
            }
        }

        TempReport {
            cpu: cpu_reading.unwrap_or(cfg.default_cpu_temp_c),
            gpu0: gpu0.unwrap_or(cfg.default_gpu_temp_c),
            gpu1: gpu1.unwrap_or(cfg.default_gpu_temp_c),
            cpu_substituted: cpu_reading.is_none(),
            gpu_stale: remote.stale,
            gpu0_substituted: gpu0.is_none(),
            gpu1_substituted: gpu1.is_none(),
        }
    }

    fn emit_changes(&self, report: &CycleReport, sink: &mut impl EventSink) {
        match &self.last_report {
            None => sink.emit(&AppEvent::InitialState(report.clone())),
            Some(prev) => {
                if report.emergency || report.temps_changed(prev) {
                    sink.emit(&AppEvent::Temperatures(report.temps));
                }
                for change in report.fan_changes(prev) {
                    sink.emit(&AppEvent::FanChanged(change));
                }
            }
        }
        if report.emergency {
            sink.emit(&AppEvent::Emergency {
                threshold_c: self.config.emergency_temp_c,
                temps: report.temps,
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
