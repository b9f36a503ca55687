//! zonefan: main entry point.
//!
//! Hexagonal architecture: adapters on the outside, the control loop in
//! the middle, two OS threads in total.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  SensorHub          SmcFanAdapter   LogEventSink             │
//! │  (hwmon + UDP)      (ActuatorPort)  (EventSink)              │
//! │  JsonConfigFile     TelemetryIngest (listener thread)        │
//! │  (ConfigPort)                                                │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │            ControlLoop (main thread)                   │  │
//! │  │  Curves · ZoneMixer · Hysteresis · LoopState           │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use zonefan::adapters::config_file::JsonConfigFile;
use zonefan::adapters::hwmon::HwmonCpuSensor;
use zonefan::adapters::log_sink::LogEventSink;
use zonefan::adapters::sensors::SensorHub;
use zonefan::adapters::smc::SmcFanAdapter;
use zonefan::app::ports::ConfigPort;
use zonefan::app::runner;
use zonefan::app::service::ControlLoop;
use zonefan::config::{SystemConfig, validate_config};
use zonefan::diagnostics;
use zonefan::telemetry::{SharedTelemetry, TelemetryIngest};

#[derive(Parser, Debug)]
#[command(name = "zonefan", version, about = "Per-zone fan control daemon")]
struct Cli {
    /// JSON configuration file (defaults are used if it does not exist)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Command every zone fan to the safe duty, wait, report RPM and exit
    #[arg(long)]
    test: bool,

    /// Write the default configuration as JSON and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Logging ────────────────────────────────────────────
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    diagnostics::install_panic_handler();

    info!("zonefan v{}", env!("CARGO_PKG_VERSION"));

    if let Some(path) = &cli.write_default_config {
        JsonConfigFile::new(path)
            .save(&SystemConfig::default())
            .with_context(|| format!("writing default config to {}", path.display()))?;
        return Ok(());
    }

    // ── 2. Configuration ──────────────────────────────────────
    let config = match &cli.config {
        Some(path) => JsonConfigFile::new(path)
            .load()
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let cfg = SystemConfig::default();
            validate_config(&cfg).context("built-in defaults")?;
            cfg
        }
    };

    for line in config.summary_lines() {
        info!("{}", line);
    }

    // ── 3. Actuators ──────────────────────────────────────────
    let mut fans = SmcFanAdapter::new(&config.smc_base, config.fans.clone());

    if cli.test {
        let results = diagnostics::run_fan_test(
            &mut fans,
            &config,
            config.safe_duty_percent,
            diagnostics::FAN_TEST_HOLD,
        );
        for r in &results {
            info!(
                "TEST | fan {} ({}): target {} RPM, actual {}",
                r.fan_id,
                r.name,
                r.target_rpm,
                r.actual_rpm
                    .map_or_else(|| "n/a".to_owned(), |rpm| rpm.to_string())
            );
        }
        for s in diagnostics::collect_fan_status(&fans, &config) {
            info!("TEST | fan {} manual={:?} rpm={:?}", s.fan_id, s.manual, s.rpm);
        }
        return Ok(());
    }

    // ── 4. Stop flag ──────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("Shutdown signal received");
            running.store(false, Ordering::Release);
        })
        .context("installing signal handler")?;
    }

    // ── 5. Telemetry listener + sensors ───────────────────────
    let telemetry = Arc::new(SharedTelemetry::new(config.gpu_stale_timeout()));
    let mut ingest = TelemetryIngest::start(
        config.listen_addr,
        config.recv_timeout(),
        Arc::clone(&telemetry),
    )
    .with_context(|| format!("binding telemetry listener on {}", config.listen_addr))?;

    let mut sensors = SensorHub::new(HwmonCpuSensor::discover(&config.hwmon_base), telemetry);
    let mut sink = LogEventSink::new();

    // ── 6. Control loop ───────────────────────────────────────
    let mut app = ControlLoop::new(config);
    app.start(&mut fans, &mut sink);
    info!("System ready. Entering control loop.");

    let cycles = runner::run(&mut app, &mut sensors, &mut fans, &mut sink, &running);

    // ── 7. Shutdown ───────────────────────────────────────────
    ingest.stop();
    app.shutdown(&mut fans, &mut sink);
    info!("Stopped after {} cycles", cycles);
    Ok(())
}
