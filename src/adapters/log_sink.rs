//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering application events as tagged log
//! lines through the `log` facade.  The binary installs `env_logger`, so
//! the lines end up on stderr / the journal.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::report::TempReport;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn temps_line(t: &TempReport) -> String {
    format!(
        "CPU={:.1}\u{00b0}C{} GPU0={:.1}\u{00b0}C{} GPU1={:.1}\u{00b0}C{}{}",
        t.cpu,
        if t.cpu_substituted { "*" } else { "" },
        t.gpu0,
        if t.gpu0_substituted { "*" } else { "" },
        t.gpu1,
        if t.gpu1_substituted { "*" } else { "" },
        if t.gpu_stale { " [STALE]" } else { "" },
    )
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { fans, simulated } => {
                info!(
                    "START | {} zone fans{}",
                    fans,
                    if *simulated { " (simulated)" } else { "" }
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::ModeChanged { fan, manual, ok } => {
                let mode = if *manual { "manual" } else { "automatic" };
                if *ok {
                    info!("MODE | fan {} -> {}", fan, mode);
                } else {
                    warn!("MODE | fan {} -> {} failed", fan, mode);
                }
            }
            AppEvent::ReadingSubstituted { source, default_c } => {
                warn!(
                    "TEMPS | {:?} unavailable, using default {:.1}\u{00b0}C",
                    source, default_c
                );
            }
            AppEvent::InitialState(report) => {
                info!("TEMPS | {}", temps_line(&report.temps));
                let p = &report.percents;
                info!(
                    "TEMPS | sources cpu={:.0}% gpu0={:.0}% ({:?}) gpu1={:.0}% ({:?})",
                    p.cpu, p.gpu0, p.gpu0_source, p.gpu1, p.gpu1_source
                );
                for fan in &report.fans {
                    info!(
                        "FAN | {} ({}): {:.0}% -> {} RPM (actual {})",
                        fan.fan_id,
                        fan.name,
                        fan.final_percent,
                        fan.target_rpm,
                        fan.actual_rpm
                            .map_or_else(|| "n/a".to_owned(), |r| r.to_string()),
                    );
                }
            }
            AppEvent::Temperatures(t) => {
                info!("TEMPS | {}", temps_line(t));
            }
            AppEvent::FanChanged(c) => {
                info!(
                    "FAN | {} ({}): {:.0}% -> {:.0}% ({} RPM)",
                    c.fan_id, c.name, c.from_percent, c.to_percent, c.target_rpm
                );
            }
            AppEvent::Emergency { threshold_c, temps } => {
                error!(
                    "EMERGENCY | {} (threshold {:.1}\u{00b0}C), all fans 100%",
                    temps_line(temps),
                    threshold_c
                );
            }
            AppEvent::FailSafe { reason, percent } => {
                warn!("FAILSAFE | {} - all zone fans to {:.0}%", reason, percent);
            }
        }
    }
}
