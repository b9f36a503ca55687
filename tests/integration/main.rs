//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no fan
//! registers or GPU host required.

mod control_loop_tests;
mod mock_hw;
mod telemetry_tests;
