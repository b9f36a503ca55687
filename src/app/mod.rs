//! Application core: control loop orchestration over port traits.
//!
//! The cycle itself (substitution, mixing, hysteresis, actuation, change
//! reporting) lives in [`service`]; [`runner`] drives it at a fixed period.
//! All interaction with hardware and the network happens through the
//! traits in [`ports`], so this layer runs against mocks in tests.

pub mod events;
pub mod ports;
pub mod report;
pub mod runner;
pub mod service;
