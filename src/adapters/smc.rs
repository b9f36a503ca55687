//! SMC fan register adapter.
//!
//! Implements [`ActuatorPort`] over the sysfs-style files the Apple SMC
//! driver exposes under one root directory:
//!
//! | Register        | Contents                          |
//! |-----------------|-----------------------------------|
//! | `fan{N}_input`  | measured RPM                      |
//! | `fan{N}_manual` | `1` = manual, `0` = firmware auto |
//! | `fan{N}_output` | target RPM (manual mode only)     |
//!
//! The root is checked once at construction.  If it does not exist the
//! adapter runs in **simulated** mode: writes succeed and are logged with a
//! `[SIM]` tag, reads return `None`.  In live mode every I/O or parse
//! failure is logged and surfaces as `None` / `false`.

use std::fs;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{ActuatorPort, FanMode};
use crate::config::{FanConfig, FanId};
use crate::error::{ActuatorError, Error, Result};

pub struct SmcFanAdapter {
    base: PathBuf,
    simulated: bool,
    fans: Vec<FanConfig>,
}

impl SmcFanAdapter {
    pub fn new(base: impl Into<PathBuf>, fans: Vec<FanConfig>) -> Self {
        let base = base.into();
        let simulated = !base.is_dir();
        if simulated {
            warn!(
                "SMC root {} not found, running in simulation mode",
                base.display()
            );
        } else {
            info!("SMC fan registers at {}", base.display());
        }
        Self {
            base,
            simulated,
            fans,
        }
    }

    pub fn fan(&self, id: FanId) -> Option<&FanConfig> {
        self.fans.iter().find(|f| f.id == id)
    }

    fn register(&self, fan: FanId, name: &str) -> PathBuf {
        self.base.join(format!("fan{fan}_{name}"))
    }

    fn read_register(
        &self,
        fan: FanId,
        name: &str,
    ) -> core::result::Result<String, ActuatorError> {
        fs::read_to_string(self.register(fan, name))
            .map(|s| s.trim().to_owned())
            .map_err(|_| ActuatorError::ReadFailed)
    }

    fn write_register(&self, fan: FanId, name: &str, value: &str) -> Result<()> {
        fs::write(self.register(fan, name), value).map_err(|_| ActuatorError::WriteFailed)?;
        Ok(())
    }

    fn try_read_speed(&self, fan: FanId) -> Result<u32> {
        self.read_register(fan, "input")?
            .parse()
            .map_err(|_| ActuatorError::Parse.into())
    }

    fn try_read_mode(&self, fan: FanId) -> Result<FanMode> {
        match self.read_register(fan, "manual")?.as_str() {
            "1" => Ok(FanMode::Manual),
            "0" => Ok(FanMode::Automatic),
            _ => Err(ActuatorError::Parse.into()),
        }
    }
}

impl ActuatorPort for SmcFanAdapter {
    fn read_speed(&self, fan: FanId) -> Option<u32> {
        if self.simulated {
            return None;
        }
        self.try_read_speed(fan)
            .map_err(|e| warn!("Fan {} speed: {}", fan, e))
            .ok()
    }

    fn read_mode(&self, fan: FanId) -> Option<FanMode> {
        if self.simulated {
            return None;
        }
        self.try_read_mode(fan)
            .map_err(|e| warn!("Fan {} mode: {}", fan, e))
            .ok()
    }

    fn set_mode(&mut self, fan: FanId, manual: bool) -> bool {
        let value = if manual { "1" } else { "0" };
        if self.simulated {
            info!("[SIM] fan{}_manual <- {}", fan, value);
            return true;
        }
        match self.write_register(fan, "manual", value) {
            Ok(()) => true,
            Err(e) => {
                warn!("Fan {} set manual={}: {}", fan, manual, e);
                false
            }
        }
    }

    fn command_rpm(&mut self, fan: FanId, rpm: u32) -> bool {
        let Some(cfg) = self.fan(fan) else {
            warn!("Fan {}: {}", fan, Error::from(ActuatorError::UnknownFan));
            return false;
        };
        let rpm = cfg.clamp_rpm(rpm);

        if self.simulated {
            info!("[SIM] fan{}_output <- {}", fan, rpm);
            return true;
        }
        match self.write_register(fan, "output", &rpm.to_string()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Fan {} set {} RPM: {}", fan, rpm, e);
                false
            }
        }
    }

    fn is_simulated(&self) -> bool {
        self.simulated
    }
}
