//! Pad server internals.
//!
//! Two long-running tasks share the pad state: the controller task owns the
//! TCP control channel and is the only writer of operator intent, and the
//! telemetry task owns the UDP multicast socket and publishes sensor
//! samples plus full-state heartbeats.

use std::time::{Duration, Instant};

use thiserror::Error;

pub mod controller;
pub mod telemetry;

pub use controller::{Controller, ControllerConfig};
pub use telemetry::{Telemetry, TelemetryConfig};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("controller did not reconnect within {0:?}")]
    ReconnectTimeout(Duration),
}

/// Monotonic pad uptime, the time base for every telemetry timestamp.
///
/// Wraps a `u32` millisecond counter after ~49 days, far beyond any pad
/// session.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    started: Instant,
}

impl Uptime {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds since the pad server started.
    pub fn now_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }
}
