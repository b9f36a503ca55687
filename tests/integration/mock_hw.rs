//! Mock ports for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real SMC registers.

use std::collections::{BTreeMap, BTreeSet};

use zonefan::app::events::AppEvent;
use zonefan::app::ports::{ActuatorPort, ConfigError, ConfigPort, EventSink, FanMode, SensorPort};
use zonefan::config::{FanId, SystemConfig, validate_config};
use zonefan::telemetry::{RemoteFanDuties, RemoteTemperatures};

// ── Sensors ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MockSensors {
    pub cpu: Option<f64>,
    pub temps: RemoteTemperatures,
    pub duties: RemoteFanDuties,
    pub cpu_reads: usize,
}

#[allow(dead_code)]
impl MockSensors {
    /// Fresh telemetry, no fan duty reported.
    pub fn new(cpu: f64, gpu0: f64, gpu1: f64) -> Self {
        Self {
            cpu: Some(cpu),
            temps: RemoteTemperatures {
                gpu0: Some(gpu0),
                gpu1: Some(gpu1),
                stale: false,
            },
            duties: RemoteFanDuties {
                gpu0: None,
                gpu1: None,
                stale: false,
            },
            cpu_reads: 0,
        }
    }

    pub fn set_temps(&mut self, cpu: f64, gpu0: f64, gpu1: f64) {
        self.cpu = Some(cpu);
        self.temps.gpu0 = Some(gpu0);
        self.temps.gpu1 = Some(gpu1);
    }

    pub fn go_stale(&mut self) {
        self.temps.stale = true;
        self.duties.stale = true;
    }
}

impl SensorPort for MockSensors {
    fn read_cpu_temp(&mut self) -> Option<f64> {
        self.cpu_reads += 1;
        self.cpu
    }

    fn remote_temperatures(&self) -> RemoteTemperatures {
        self.temps
    }

    fn remote_fan_duties(&self) -> RemoteFanDuties {
        self.duties
    }
}

// ── Fans ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FanCall {
    SetMode { fan: FanId, manual: bool },
    CommandRpm { fan: FanId, rpm: u32 },
}

#[derive(Debug, Default)]
pub struct MockFans {
    pub calls: Vec<FanCall>,
    pub modes: BTreeMap<FanId, FanMode>,
    pub outputs: BTreeMap<FanId, u32>,
    /// Fans whose writes fail.
    pub broken: BTreeSet<FanId>,
}

#[allow(dead_code)]
impl MockFans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rpm(&self, fan: FanId) -> Option<u32> {
        self.outputs.get(&fan).copied()
    }

    pub fn commands_for(&self, fan: FanId) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                FanCall::CommandRpm { fan: f, rpm } if *f == fan => Some(*rpm),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl ActuatorPort for MockFans {
    fn read_speed(&self, fan: FanId) -> Option<u32> {
        self.outputs.get(&fan).copied()
    }

    fn read_mode(&self, fan: FanId) -> Option<FanMode> {
        self.modes.get(&fan).copied()
    }

    fn set_mode(&mut self, fan: FanId, manual: bool) -> bool {
        self.calls.push(FanCall::SetMode { fan, manual });
        if self.broken.contains(&fan) {
            return false;
        }
        let mode = if manual {
            FanMode::Manual
        } else {
            FanMode::Automatic
        };
        self.modes.insert(fan, mode);
        true
    }

    fn command_rpm(&mut self, fan: FanId, rpm: u32) -> bool {
        self.calls.push(FanCall::CommandRpm { fan, rpm });
        if self.broken.contains(&fan) {
            return false;
        }
        self.outputs.insert(fan, rpm.clamp(500, 2500));
        true
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Config store ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryConfig {
    pub stored: std::cell::RefCell<Option<SystemConfig>>,
}

impl ConfigPort for MemoryConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let cfg = self.stored.borrow().clone().unwrap_or_default();
        validate_config(&cfg)?;
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        *self.stored.borrow_mut() = Some(config.clone());
        Ok(())
    }
}
