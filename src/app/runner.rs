//! Fixed-period driver for the [`ControlLoop`].
//!
//! Runs cycles back to back on the calling thread until the shared running
//! flag is cleared.  After each cycle it sleeps `max(0, period - elapsed)`,
//! so an overrunning cycle shortens or skips the sleep rather than
//! accumulating drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use log::debug;

use super::ports::{ActuatorPort, EventSink, SensorPort};
use super::service::ControlLoop;

/// Cycle until `running` goes false.  Returns the number of cycles run.
///
/// The flag is checked only at cycle boundaries; a stop request takes at
/// most one period to be observed.
pub fn run(
    app: &mut ControlLoop,
    sensors: &mut impl SensorPort,
    fans: &mut impl ActuatorPort,
    sink: &mut impl EventSink,
    running: &AtomicBool,
) -> u64 {
    let period = app.config().poll_interval();
    let mut cycles = 0;

    while running.load(Ordering::Acquire) {
        let started = Instant::now();
        app.run_cycle(sensors, fans, sink);
        cycles += 1;

        let elapsed = started.elapsed();
        match period.checked_sub(elapsed) {
            Some(rest) if running.load(Ordering::Acquire) => thread::sleep(rest),
            Some(_) => {}
            None => debug!("Cycle overran period by {:?}", elapsed - period),
        }
    }

    cycles
}
