// src/config.rs
//
// Timing constants for the note lifecycle.

use crate::clock::Time;

/// Default audio configuration
pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

/// Durations that shape every note's lifecycle.
///
/// All values are in clock seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// How far ahead of `now` a mute must land so the renderer sees it in time.
    pub safety_margin: Time,
    /// Length of the fader ramp used by a mute.
    pub mute_release: Time,
    /// Extra margin after a mute ramp before the note counts as silent.
    pub silence_guard: Time,
    /// Length of a note's natural decay.
    pub natural_release: Time,
    /// Length of a voice-level damp.
    pub damp_time: Time,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            safety_margin: 0.04,
            mute_release: 0.01,
            silence_guard: 0.01,
            natural_release: 1.5,
            damp_time: 0.002,
        }
    }
}

impl Timing {
    pub fn with_safety_margin(mut self, seconds: Time) -> Self {
        self.safety_margin = seconds.max(0.0);
        self
    }

    pub fn with_mute_release(mut self, seconds: Time) -> Self {
        self.mute_release = seconds.max(0.0);
        self
    }

    pub fn with_silence_guard(mut self, seconds: Time) -> Self {
        self.silence_guard = seconds.max(0.0);
        self
    }

    pub fn with_natural_release(mut self, seconds: Time) -> Self {
        self.natural_release = seconds.max(0.0);
        self
    }

    pub fn with_damp_time(mut self, seconds: Time) -> Self {
        self.damp_time = seconds.max(0.0);
        self
    }

    /// Time from a mute's start until the note is guaranteed silent.
    #[inline]
    pub fn mute_tail(&self) -> Time {
        self.mute_release + self.silence_guard
    }
}

/// Configuration for a host-driven scheduler session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostConfig {
    /// Sample rate in Hz, used when the host reports time in frames.
    pub sample_rate: f64,
    pub timing: Timing,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            timing: Timing::default(),
        }
    }
}
