//! Outbound application events.
//!
//! The [`ControlLoop`](super::service::ControlLoop) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::config::{FanId, HeatSource};

use super::report::{CycleReport, FanChange, TempReport};
use super::service::LoopState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The loop has started.
    Started { fans: usize, simulated: bool },

    /// The loop moved between lifecycle states.
    StateChanged { from: LoopState, to: LoopState },

    /// A fan's control mode was changed at startup.
    ModeChanged { fan: FanId, manual: bool, ok: bool },

    /// A reading failed or went stale and a default was used instead.
    ReadingSubstituted { source: HeatSource, default_c: f64 },

    /// Full report of the first cycle.
    InitialState(CycleReport),

    /// Temperatures moved significantly (or an emergency is active).
    Temperatures(TempReport),

    /// A fan's duty moved significantly.
    FanChanged(FanChange),

    /// Some temperature reached the emergency threshold this cycle.
    Emergency { threshold_c: f64, temps: TempReport },

    /// Every fan was driven to the safe duty.
    FailSafe { reason: String, percent: f64 },
}
