//! Remote GPU telemetry ingest.
//!
//! A Windows VM owns the GPUs and pushes their temperatures and fan duty
//! over UDP.  A single listener thread decodes each datagram and merges it
//! into a [`SharedTelemetry`] cell; the control loop reads consistent
//! snapshots from the same cell.
//!
//! ```text
//! ┌─────────────┐  UDP  ┌─────────────────┐  Mutex  ┌─────────────────┐
//! │ GPU host/VM │──────▶│ listener thread │────────▶│ TelemetrySample │
//! └─────────────┘       └─────────────────┘         └────────┬────────┘
//!                                                            │ snapshot
//!                                                      control loop
//! ```
//!
//! ## Shutdown
//!
//! The listener blocks in `recv_from` with a read timeout.  On every
//! timeout it re-checks the shared running flag, so [`TelemetryIngest::stop`]
//! takes at most one receive timeout to be observed.

pub mod packet;

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use packet::{MAX_DATAGRAM, TelemetryPacket};

use crate::error::Result;

/// How long [`TelemetryIngest::stop`] waits for the listener to exit.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Shared sample
// ---------------------------------------------------------------------------

/// Latest known remote values.  No history; fields are overwritten in place.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySample {
    pub gpu0_temp: Option<f64>,
    pub gpu1_temp: Option<f64>,
    pub gpu0_fan: Option<f64>,
    pub gpu1_fan: Option<f64>,
    /// `None` until the first valid packet arrives.
    pub last_update: Option<Instant>,
}

impl TelemetrySample {
    /// Merge present fields from `packet` and stamp `now`.
    pub fn merge(&mut self, packet: &TelemetryPacket, now: Instant) {
        if packet.gpu0_temp.is_some() {
            self.gpu0_temp = packet.gpu0_temp;
        }
        if packet.gpu1_temp.is_some() {
            self.gpu1_temp = packet.gpu1_temp;
        }
        if packet.gpu0_fan.is_some() {
            self.gpu0_fan = packet.gpu0_fan;
        }
        if packet.gpu1_fan.is_some() {
            self.gpu1_fan = packet.gpu1_fan;
        }
        self.last_update = Some(now);
    }

    /// Never-updated samples are stale by definition.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        match self.last_update {
            Some(at) => now.saturating_duration_since(at) > timeout,
            None => true,
        }
    }
}

/// GPU temperatures as seen by the control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteTemperatures {
    pub gpu0: Option<f64>,
    pub gpu1: Option<f64>,
    pub stale: bool,
}

/// GPU self-reported fan duty as seen by the control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteFanDuties {
    pub gpu0: Option<f64>,
    pub gpu1: Option<f64>,
    pub stale: bool,
}

/// Lock-guarded telemetry cell shared by the listener and the control loop.
#[derive(Debug)]
pub struct SharedTelemetry {
    sample: Mutex<TelemetrySample>,
    stale_timeout: Duration,
}

impl SharedTelemetry {
    pub fn new(stale_timeout: Duration) -> Self {
        Self {
            sample: Mutex::new(TelemetrySample::default()),
            stale_timeout,
        }
    }

    /// Apply a decoded packet.  Called from the listener thread only.
    pub fn apply(&self, packet: &TelemetryPacket, now: Instant) {
        self.sample.lock().merge(packet, now);
    }

    /// Copy of the whole sample.
    pub fn snapshot(&self) -> TelemetrySample {
        *self.sample.lock()
    }

    pub fn temperatures_at(&self, now: Instant) -> RemoteTemperatures {
        let s = self.sample.lock();
        RemoteTemperatures {
            gpu0: s.gpu0_temp,
            gpu1: s.gpu1_temp,
            stale: s.is_stale(now, self.stale_timeout),
        }
    }

    pub fn fan_duties_at(&self, now: Instant) -> RemoteFanDuties {
        let s = self.sample.lock();
        RemoteFanDuties {
            gpu0: s.gpu0_fan,
            gpu1: s.gpu1_fan,
            stale: s.is_stale(now, self.stale_timeout),
        }
    }

    pub fn get_temperatures(&self) -> RemoteTemperatures {
        self.temperatures_at(Instant::now())
    }

    pub fn get_fan_duties(&self) -> RemoteFanDuties {
        self.fan_duties_at(Instant::now())
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Owns the UDP listener thread.
pub struct TelemetryIngest {
    shared: Arc<SharedTelemetry>,
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl TelemetryIngest {
    /// Bind `addr` and spawn the listener thread.
    pub fn start(
        addr: SocketAddr,
        recv_timeout: Duration,
        shared: Arc<SharedTelemetry>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(recv_timeout))?;
        let local_addr = socket.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("gpu-telemetry".into())
                .spawn(move || listener_loop(&socket, &shared, &running))?
        };

        info!("GPU telemetry listener started on {}", local_addr);
        Ok(Self {
            shared,
            running,
            local_addr,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shared(&self) -> &Arc<SharedTelemetry> {
        &self.shared
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request a stop and wait up to [`JOIN_TIMEOUT`] for the thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return;
        };

        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                error!("GPU telemetry listener panicked");
            }
            info!("GPU telemetry listener stopped");
        } else {
            warn!(
                "GPU telemetry listener did not stop within {:?}, detaching",
                JOIN_TIMEOUT
            );
        }
    }
}

impl Drop for TelemetryIngest {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listener_loop(socket: &UdpSocket, shared: &SharedTelemetry, running: &AtomicBool) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while running.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                if let Err(e) = handle_datagram(&buf[..len], from, shared) {
                    warn!("Invalid packet from {}: {}", from, e);
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => {
                if running.load(Ordering::Acquire) {
                    error!("UDP receive error: {}", e);
                }
            }
        }
    }
}

/// Decode and apply one datagram.  Bad input leaves the sample untouched.
pub fn handle_datagram(data: &[u8], from: SocketAddr, shared: &SharedTelemetry) -> Result<()> {
    let p = packet::decode(data)?;
    shared.apply(&p, Instant::now());
    let s = shared.snapshot();
    debug!(
        "Received from {}: GPU0={:?}C/{:?}%, GPU1={:?}C/{:?}%",
        from, s.gpu0_temp, s.gpu0_fan, s.gpu1_temp, s.gpu1_fan
    );
    Ok(())
}
