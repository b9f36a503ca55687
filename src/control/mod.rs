//! Control primitives: thermal curves, zone blending, and the hysteresis
//! gate.  Pure logic, no I/O.

pub mod curve;
pub mod hysteresis;
pub mod mixer;
