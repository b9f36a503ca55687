//! Fan self-test and runtime diagnostics.
//!
//! `zonefan --test` commands every zone fan to one duty, waits for the
//! rotors to settle and reports the measured speed.  The status snapshot
//! covers every fan the daemon knows about, including the ones left in
//! firmware automatic mode.

use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::app::ports::{ActuatorPort, FanMode};
use crate::config::{FanId, SystemConfig};

/// Settle time between commanding the test duty and reading RPM.
pub const FAN_TEST_HOLD: Duration = Duration::from_secs(5);

/// Result of commanding one fan during the self-test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanTestResult {
    pub fan_id: FanId,
    pub name: String,
    pub percent: f64,
    pub target_rpm: u32,
    pub commanded: bool,
    pub actual_rpm: Option<u32>,
}

/// Point-in-time register view of one fan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanStatus {
    pub fan_id: FanId,
    pub manual: Option<bool>,
    pub rpm: Option<u32>,
}

/// Put every zone fan in manual mode, command `percent`, wait `hold`,
/// then read back the speed.
pub fn run_fan_test(
    fans: &mut impl ActuatorPort,
    config: &SystemConfig,
    percent: f64,
    hold: Duration,
) -> Vec<FanTestResult> {
    let zone_fans: Vec<_> = config
        .zones
        .iter()
        .filter_map(|z| config.fan(z.fan_id))
        .collect();

    let mut results = Vec::with_capacity(zone_fans.len());
    for fan in &zone_fans {
        if fans.read_mode(fan.id) != Some(FanMode::Manual) {
            fans.set_mode(fan.id, true);
        }
        let (target_rpm, commanded) = fans.command_percent(fan, percent);
        log::info!(
            "TEST | fan {} ({}) -> {:.0}% / {} RPM",
            fan.id,
            fan.name,
            percent,
            target_rpm
        );
        results.push(FanTestResult {
            fan_id: fan.id,
            name: fan.name.clone(),
            percent,
            target_rpm,
            commanded,
            actual_rpm: None,
        });
    }

    thread::sleep(hold);

    for result in &mut results {
        result.actual_rpm = fans.read_speed(result.fan_id);
    }
    results
}

/// Mode and speed of every zone-controlled and automatic fan.
pub fn collect_fan_status(fans: &impl ActuatorPort, config: &SystemConfig) -> Vec<FanStatus> {
    let mut ids: Vec<FanId> = config
        .fans
        .iter()
        .map(|f| f.id)
        .chain(config.automatic_fans.iter().copied())
        .collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|id| FanStatus {
            fan_id: id,
            manual: fans.read_mode(id).map(|m| m == FanMode::Manual),
            rpm: fans.read_speed(id),
        })
        .collect()
}

// ───────────────────────────────────────────────────────────────
// Panic hook: route panic messages through the logger
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that reports through `log` instead of raw stderr.
///
/// Panics inside a control cycle are caught by the loop and do not end
/// the process; this hook makes sure the message and location still reach
/// the journal with the rest of the daemon's output.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
