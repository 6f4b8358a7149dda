//! Tunable timing parameters for the button and ultrasound controllers.
//!
//! Durations are stored as integer milliseconds/microseconds so the structs
//! serialise cleanly; accessors convert to `embassy_time::Duration`,
//! capping every value at `MAX_TIMING_MS` so timers built from a config can
//! always be scheduled.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

/// Upper bound on any configured timing, about 49 days.
pub const MAX_TIMING_MS: u64 = u32::MAX as u64;

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms.min(MAX_TIMING_MS))
}

fn micros(us: u64) -> Duration {
    Duration::from_micros(us.min(MAX_TIMING_MS * 1000))
}

/// Gesture timing for the four user buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// Maximum gap between two presses that counts as a double press.
    pub double_press_window_ms: u64,
    /// Minimum time a button must stay down before a hold starts.
    pub hold_ms: u64,
    /// Settle time after an edge before the line level is sampled.
    pub debounce_ms: u64,
}

impl ButtonConfig {
    pub fn double_press_window(&self) -> Duration {
        millis(self.double_press_window_ms)
    }

    pub fn hold(&self) -> Duration {
        millis(self.hold_ms)
    }

    pub fn debounce(&self) -> Duration {
        millis(self.debounce_ms)
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            double_press_window_ms: 1000,
            hold_ms: 1000,
            debounce_ms: 50,
        }
    }
}

/// Trigger/echo timing for the HC-SR04.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrasoundConfig {
    /// Sensor dead time subtracted from every echo pulse.
    pub offset_us: u64,
    /// Width of the trigger pulse.
    pub trigger_pulse_us: u64,
    /// Bound on both edge waits of one sample, measured from the trigger.
    pub sample_timeout_ms: u64,
    /// Bound on a whole `read_distance` call.
    pub read_timeout_ms: u64,
    /// Pause between consecutive samples so stray echoes die out.
    pub sample_interval_ms: u64,
}

impl UltrasoundConfig {
    pub fn offset(&self) -> Duration {
        micros(self.offset_us)
    }

    pub fn trigger_pulse(&self) -> Duration {
        micros(self.trigger_pulse_us)
    }

    pub fn sample_timeout(&self) -> Duration {
        millis(self.sample_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        millis(self.read_timeout_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        millis(self.sample_interval_ms)
    }
}

impl Default for UltrasoundConfig {
    fn default() -> Self {
        Self {
            offset_us: 190,
            trigger_pulse_us: 10,
            sample_timeout_ms: 100,
            read_timeout_ms: 1000,
            sample_interval_ms: 60,
        }
    }
}

/// Configuration for every controller owned by a `Robot`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub buttons: ButtonConfig,
    pub ultrasound: UltrasoundConfig,
}

impl RobotConfig {
    /// Parse a JSON config; missing fields fall back to their defaults.
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}
