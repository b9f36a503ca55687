//! Fuzz target: telemetry datagram decoding and merge
//!
//! Drives arbitrary bytes through the packet decoder and, when they decode,
//! through the shared sample merge.  Neither step may panic, and a merged
//! field must always equal the packet's value when the packet carried one.
//!
//! cargo fuzz run fuzz_telemetry_packet

#![no_main]

use std::time::{Duration, Instant};

use libfuzzer_sys::fuzz_target;
use zonefan::telemetry::SharedTelemetry;
use zonefan::telemetry::packet::{self, MAX_DATAGRAM};

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_DATAGRAM)];
    let Ok(p) = packet::decode(data) else {
        return;
    };

    let shared = SharedTelemetry::new(Duration::from_secs(10));
    shared.apply(&p, Instant::now());
    let s = shared.snapshot();

    if p.gpu0_temp.is_some() {
        assert_eq!(s.gpu0_temp, p.gpu0_temp);
    }
    if p.gpu1_fan.is_some() {
        assert_eq!(s.gpu1_fan, p.gpu1_fan);
    }
    assert!(s.last_update.is_some(), "a decoded packet always stamps the sample");
});
