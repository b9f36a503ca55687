//! Local CPU temperature from the Linux hwmon class.
//!
//! Scans `<base>/*/name` once for a known CPU driver and then reads every
//! `temp*_input` in that directory on each call, returning the hottest.
//! Values are millidegrees Celsius.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::SensorError;

/// hwmon driver names that report package / core temperatures.
pub const CPU_DRIVERS: [&str; 3] = ["coretemp", "k10temp", "zenpower"];

#[derive(Debug, Clone)]
pub struct HwmonCpuSensor {
    /// hwmon device directory, `None` if no CPU driver was found.
    device: Option<PathBuf>,
}

impl HwmonCpuSensor {
    /// Scan `base` (normally `/sys/class/hwmon`) for a CPU driver.
    pub fn discover(base: &Path) -> Self {
        let device = find_cpu_device(base);
        match &device {
            Some(dir) => info!("CPU temperature source: {}", dir.display()),
            None => warn!("No CPU hwmon device under {}", base.display()),
        }
        Self { device }
    }

    /// Use a known device directory directly.
    pub fn at(device: impl Into<PathBuf>) -> Self {
        Self {
            device: Some(device.into()),
        }
    }

    pub fn device(&self) -> Option<&Path> {
        self.device.as_deref()
    }

    /// Hottest `temp*_input` reading in °C.
    pub fn read(&self) -> Result<f64, SensorError> {
        let dir = self.device.as_deref().ok_or(SensorError::NotFound)?;
        read_max_temp(dir)
    }
}

fn find_cpu_device(base: &Path) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(base)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    dirs.sort();

    dirs.into_iter().find(|dir| {
        fs::read_to_string(dir.join("name"))
            .map(|name| CPU_DRIVERS.contains(&name.trim()))
            .unwrap_or(false)
    })
}

fn read_max_temp(dir: &Path) -> Result<f64, SensorError> {
    let entries = fs::read_dir(dir).map_err(|_| SensorError::ReadFailed)?;

    let mut max: Option<f64> = None;
    let mut last_err = SensorError::ReadFailed;
    for entry in entries.filter_map(Result::ok) {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !(name.starts_with("temp") && name.ends_with("_input")) {
            continue;
        }

        let reading = fs::read_to_string(entry.path())
            .map_err(|_| SensorError::ReadFailed)
            .and_then(|raw| raw.trim().parse::<i64>().map_err(|_| SensorError::Parse));
        match reading {
            Ok(milli) => {
                let celsius = milli as f64 / 1000.0;
                max = Some(max.map_or(celsius, |m| m.max(celsius)));
            }
            Err(e) => {
                debug!("Skipping {}: {}", entry.path().display(), e);
                last_err = e;
            }
        }
    }

    max.ok_or(last_err)
}
