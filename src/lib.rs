//! zonefan: per-zone fan control daemon library.
//!
//! Exposes the control core, telemetry ingest and adapters so the binary
//! and the integration tests share one implementation.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod telemetry;
