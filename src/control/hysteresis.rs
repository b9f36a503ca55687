//! Directional hysteresis gate for fan duty.
//!
//! A fan may only speed up once the reference temperature has risen by at
//! least `up_c` since the last accepted change, and only slow down once it
//! has fallen by at least `down_c`.  Rejected requests hold the previous
//! duty.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::FanId;

/// Per-fan filter memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisState {
    /// Reference temperature at the last accepted change.
    pub last_temp: f64,
    /// Duty returned by the last call.
    pub last_percent: f64,
    /// When the filter last ran for this fan.
    pub last_update: Instant,
}

/// Gate thresholds in °C.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub up_c: f64,
    pub down_c: f64,
}

#[derive(Debug, Default)]
pub struct HysteresisFilter {
    states: BTreeMap<FanId, HysteresisState>,
}

impl HysteresisFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter `raw_percent` for `fan` and return the duty to apply.
    pub fn apply(
        &mut self,
        fan: FanId,
        reference_temp: f64,
        raw_percent: f64,
        thresholds: Thresholds,
        now: Instant,
    ) -> f64 {
        let Some(state) = self.states.get_mut(&fan) else {
            self.states.insert(
                fan,
                HysteresisState {
                    last_temp: reference_temp,
                    last_percent: raw_percent,
                    last_update: now,
                },
            );
            return raw_percent;
        };

        let temp_delta = reference_temp - state.last_temp;
        let percent_delta = raw_percent - state.last_percent;

        let accepted = if percent_delta > 0.0 {
            temp_delta >= thresholds.up_c
        } else if percent_delta < 0.0 {
            temp_delta <= -thresholds.down_c
        } else {
            false
        };

        if accepted {
            state.last_percent = raw_percent;
            state.last_temp = reference_temp;
        }
        state.last_update = now;
        state.last_percent
    }

    /// Accept `percent` unconditionally and rebase the fan's state on it.
    pub fn force(&mut self, fan: FanId, reference_temp: f64, percent: f64, now: Instant) -> f64 {
        self.states.insert(
            fan,
            HysteresisState {
                last_temp: reference_temp,
                last_percent: percent,
                last_update: now,
            },
        );
        percent
    }

    pub fn state(&self, fan: FanId) -> Option<&HysteresisState> {
        self.states.get(&fan)
    }
}
