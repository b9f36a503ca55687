//! Sensor adapter: bridges the CPU hwmon reader and the shared GPU
//! telemetry cell to [`SensorPort`].

use std::sync::Arc;

use log::debug;

use crate::app::ports::SensorPort;
use crate::telemetry::{RemoteFanDuties, RemoteTemperatures, SharedTelemetry};

use super::hwmon::HwmonCpuSensor;

/// Every temperature and duty input of a cycle behind one port.
pub struct SensorHub {
    cpu: HwmonCpuSensor,
    telemetry: Arc<SharedTelemetry>,
}

impl SensorHub {
    pub fn new(cpu: HwmonCpuSensor, telemetry: Arc<SharedTelemetry>) -> Self {
        Self { cpu, telemetry }
    }
}

impl SensorPort for SensorHub {
    fn read_cpu_temp(&mut self) -> Option<f64> {
        match self.cpu.read() {
            Ok(t) => Some(t),
            Err(e) => {
                debug!("CPU temperature read failed: {}", e);
                None
            }
        }
    }

    fn remote_temperatures(&self) -> RemoteTemperatures {
        self.telemetry.get_temperatures()
    }

    fn remote_fan_duties(&self) -> RemoteFanDuties {
        self.telemetry.get_fan_duties()
    }
}
