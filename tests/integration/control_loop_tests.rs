//! Integration tests for the ControlLoop → mixer → hysteresis → fans
//! pipeline, run against the mock ports.

use std::time::{Duration, Instant};

use zonefan::app::events::AppEvent;
use zonefan::app::ports::{ConfigPort, FanMode};
use zonefan::app::service::{ControlLoop, LoopState};
use zonefan::config::{HeatSource, SystemConfig, ZoneWeights};
use zonefan::control::mixer::DutySource;

use crate::mock_hw::{FanCall, MemoryConfig, MockFans, MockSensors, RecordingSink};

fn make_loop(config: SystemConfig) -> (ControlLoop, MockFans, RecordingSink) {
    let mut app = ControlLoop::new(config);
    let mut fans = MockFans::new();
    let mut sink = RecordingSink::new();
    app.start(&mut fans, &mut sink);
    fans.clear();
    sink.clear();
    (app, fans, sink)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_claims_zone_fans_and_releases_automatic_ones() {
    let mut app = ControlLoop::new(SystemConfig::default());
    let mut fans = MockFans::new();
    fans.modes.insert(1, FanMode::Manual);
    fans.modes.insert(2, FanMode::Manual);
    let mut sink = RecordingSink::new();

    app.start(&mut fans, &mut sink);

    assert_eq!(app.state(), LoopState::Running);
    assert!(!fans.calls.contains(&FanCall::SetMode { fan: 2, manual: true }));
    assert!(fans.calls.contains(&FanCall::SetMode { fan: 3, manual: true }));
    assert!(fans.calls.contains(&FanCall::SetMode { fan: 4, manual: true }));
    assert!(fans.calls.contains(&FanCall::SetMode { fan: 1, manual: false }));
    assert_eq!(fans.modes.get(&1), Some(&FanMode::Automatic));
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::StateChanged {
                from: LoopState::Starting,
                to: LoopState::Running
            }
        )),
        1
    );
}

#[test]
fn automatic_fan_already_automatic_is_left_alone() {
    let mut app = ControlLoop::new(SystemConfig::default());
    let mut fans = MockFans::new();
    fans.modes.insert(1, FanMode::Automatic);
    let mut sink = RecordingSink::new();
    app.start(&mut fans, &mut sink);
    assert!(!fans.calls.iter().any(|c| matches!(c, FanCall::SetMode { fan: 1, .. })));
}

// ── Normal cycle ──────────────────────────────────────────────

#[test]
fn zone_blend_drives_each_fan() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);

    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();

    // cpu 45 -> 37.5, gpu0 70 -> 62.5, gpu1 60 -> 43.33
    assert!(close(report.percents.cpu, 37.5));
    assert!(close(report.percents.gpu0, 62.5));
    assert!(close(report.percents.gpu1, 30.0 + 20.0 * 10.0 / 15.0));
    assert_eq!(report.percents.gpu0_source, DutySource::Curve);

    let fan4 = report.fan(4).unwrap();
    assert!(close(fan4.final_percent, 42.5));
    assert_eq!(fan4.target_rpm, 1350);
    assert_eq!(fans.rpm(4), Some(1350));
    assert_eq!(fan4.actual_rpm, Some(1350));

    let fan2 = report.fan(2).unwrap();
    assert!(close(fan2.raw_percent, 0.7 * 62.5 + 0.2 * report.percents.gpu1 + 0.1 * 37.5));
    assert!(fans.rpm(1).is_none(), "automatic fan is never commanded");
    assert_eq!(sink.count(|e| matches!(e, AppEvent::InitialState(_))), 1);
}

#[test]
fn config_loaded_through_port_drives_loop() {
    let store = MemoryConfig::default();
    let mut cfg = SystemConfig::default();
    cfg.zones = vec![ZoneWeights::new(4, &[(HeatSource::Cpu, 1.0)])];
    store.save(&cfg).unwrap();

    let (mut app, mut fans, mut sink) = make_loop(store.load().unwrap());
    let mut sensors = MockSensors::new(80.0, 40.0, 40.0);
    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(report.fans.len(), 1);
    assert_eq!(fans.rpm(4), Some(2500));
    assert!(fans.rpm(2).is_none());
}

#[test]
fn floor_applies_before_actuation() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(20.0, 20.0, 20.0);
    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    for fan in &report.fans {
        assert!(fan.final_percent >= 20.0);
        assert_eq!(fan.target_rpm, 900);
    }
}

// ── Substitution ──────────────────────────────────────────────

#[test]
fn stale_telemetry_substitutes_gpu_default() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 80.0, 80.0);
    sensors.go_stale();

    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert!(report.temps.gpu_stale);
    assert_eq!(report.temps.gpu0, 60.0);
    assert_eq!(report.temps.gpu1, 60.0);
    assert!(report.temps.gpu0_substituted && report.temps.gpu1_substituted);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ReadingSubstituted { .. })),
        2
    );
}

#[test]
fn failed_cpu_read_substitutes_cpu_default() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 50.0, 50.0);
    sensors.cpu = None;

    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(report.temps.cpu, 50.0);
    assert!(report.temps.cpu_substituted);
    assert!(!report.temps.gpu0_substituted);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::ReadingSubstituted {
                source: HeatSource::Cpu,
                ..
            }
        )),
        1
    );
}

#[test]
fn missing_single_gpu_uses_default_for_that_source_only() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 70.0, 70.0);
    sensors.temps.gpu1 = None;
    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(report.temps.gpu0, 70.0);
    assert_eq!(report.temps.gpu1, 60.0);
    assert!(!report.temps.gpu_stale);
}

// ── Follow mode ───────────────────────────────────────────────

#[test]
fn follow_mode_is_decided_per_source() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);
    sensors.duties.gpu0 = Some(80.0);

    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(report.percents.gpu0, 80.0);
    assert_eq!(report.percents.gpu0_source, DutySource::Follow);
    assert_eq!(report.percents.gpu1_source, DutySource::Curve);
}

#[test]
fn stale_fan_duty_falls_back_to_curve() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);
    sensors.duties.gpu0 = Some(80.0);
    sensors.duties.stale = true;

    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(report.percents.gpu0_source, DutySource::Curve);
    assert!(close(report.percents.gpu0, 62.5));
}

#[test]
fn follow_disabled_ignores_reported_duty() {
    let mut cfg = SystemConfig::default();
    cfg.follow_gpu_fans = false;
    let (mut app, mut fans, mut sink) = make_loop(cfg);
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);
    sensors.duties.gpu0 = Some(80.0);
    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(report.percents.gpu0_source, DutySource::Curve);
}

// ── Emergency ─────────────────────────────────────────────────

#[test]
fn emergency_drives_every_zone_fan_to_full() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(40.0, 40.0, 88.0);

    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert!(report.emergency);
    for fan in &report.fans {
        assert_eq!(fan.raw_percent, 100.0);
        assert_eq!(fan.target_rpm, 2500);
    }
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Emergency { .. })), 1);

    app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::Emergency { .. })),
        2,
        "emergency is reported every cycle it holds"
    );
}

#[test]
fn emergency_is_gated_by_hysteresis_unless_bypassed() {
    for bypass in [false, true] {
        let mut cfg = SystemConfig::default();
        cfg.emergency_bypasses_hysteresis = bypass;
        let (mut app, mut fans, mut sink) = make_loop(cfg);

        let mut sensors = MockSensors::new(45.0, 84.0, 60.0);
        let first = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
        assert!(!first.emergency);
        let before = first.fan(4).unwrap().final_percent;

        // +1 °C on the reference: below the 2 °C gate.
        sensors.set_temps(45.0, 85.0, 60.0);
        let second = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
        assert!(second.emergency);
        assert_eq!(second.fan(4).unwrap().raw_percent, 100.0);

        let after = second.fan(4).unwrap().final_percent;
        if bypass {
            assert_eq!(after, 100.0);
        } else {
            assert_eq!(after, before);
        }
    }
}

// ── Hysteresis ────────────────────────────────────────────────

#[test]
fn small_reference_changes_hold_duty() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);
    let first = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();

    sensors.set_temps(45.0, 71.0, 60.0);
    let second = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    let (a, b) = (first.fan(2).unwrap(), second.fan(2).unwrap());
    assert!(b.raw_percent > a.raw_percent);
    assert_eq!(b.final_percent, a.final_percent);
    assert_eq!(fans.commands_for(2).len(), 2, "held duty is still written");

    sensors.set_temps(45.0, 73.0, 60.0);
    let third = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(third.fan(2).unwrap().final_percent, third.fan(2).unwrap().raw_percent);
    assert_eq!(
        app.hysteresis().state(2).unwrap().last_temp,
        73.0,
        "reference is the hottest reading"
    );
}

#[test]
fn steady_cycles_report_nothing_new() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);
    app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    sink.clear();

    app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert!(sink.events.is_empty(), "got {:?}", sink.events);

    sensors.set_temps(45.0, 80.0, 60.0);
    app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Temperatures(_))), 1);
    assert!(sink.count(|e| matches!(e, AppEvent::FanChanged(_))) >= 1);
}

// ── Failure handling ──────────────────────────────────────────

#[test]
fn broken_fan_does_not_stop_the_others() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    fans.broken.insert(3);
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);

    let report = app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();
    let fan3 = report.fan(3).unwrap();
    assert!(!fan3.commanded);
    assert_eq!(fan3.actual_rpm, None);
    assert!(report.fan(2).unwrap().commanded);
    assert!(report.fan(4).unwrap().commanded);
    assert_eq!(app.state(), LoopState::Running);
}

#[test]
fn cycle_error_fails_safe_and_recovers_state() {
    let mut cfg = SystemConfig::default();
    cfg.zones.push(ZoneWeights::new(7, &[(HeatSource::Cpu, 1.0)]));
    let (mut app, mut fans, mut sink) = make_loop(cfg);
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);

    assert!(app.run_cycle(&mut sensors, &mut fans, &mut sink).is_none());
    assert_eq!(app.state(), LoopState::DegradedOnError);
    for id in [2, 3, 4] {
        assert_eq!(fans.commands_for(id), vec![1500]);
    }
    assert_eq!(sink.count(|e| matches!(e, AppEvent::FailSafe { .. })), 1);

    sink.clear();
    assert!(app.run_cycle(&mut sensors, &mut fans, &mut sink).is_none());
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::StateChanged {
                from: LoopState::DegradedOnError,
                to: LoopState::Running
            }
        )),
        1
    );
    assert_eq!(app.cycle_count(), 2);
}

#[test]
fn shutdown_parks_fans_at_safe_duty() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(70.0, 80.0, 80.0);
    app.run_cycle(&mut sensors, &mut fans, &mut sink).unwrap();

    app.shutdown(&mut fans, &mut sink);
    assert_eq!(app.state(), LoopState::ShuttingDown);
    for id in [2, 3, 4] {
        assert_eq!(fans.rpm(id), Some(1500));
    }
}

#[test]
fn explicit_clock_drives_hysteresis_timestamps() {
    let (mut app, mut fans, mut sink) = make_loop(SystemConfig::default());
    let mut sensors = MockSensors::new(45.0, 70.0, 60.0);
    let t0 = Instant::now();
    app.tick(&mut sensors, &mut fans, &mut sink, t0).unwrap();
    let t1 = t0 + Duration::from_millis(500);
    app.tick(&mut sensors, &mut fans, &mut sink, t1).unwrap();
    assert_eq!(app.hysteresis().state(4).unwrap().last_update, t1);
}
