// src/clock.rs
//
// Audio clock sources.
//
// Everything in the scheduler is expressed in absolute clock seconds.
// The clock itself is owned by whoever drives the scheduler; the core only
// ever reads it.

use crate::error::{ScheduleError, ScheduleResult};

/// Absolute audio clock time in seconds.
pub type Time = f64;

/// A monotonically non-decreasing time source.
pub trait Clock {
    /// Current clock time. Must never go backwards.
    fn now(&self) -> Time;
}

//
// ===============================
// MARK: Host-driven clock
// ===============================
//

/// Clock whose time is pushed in by the host.
///
/// Used when the real clock lives outside the process boundary,
/// e.g. an `AudioContext` in the browser reporting `currentTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Time,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Time) -> Self {
        Self { now }
    }

    /// Move the clock forward to `now`.
    ///
    /// Earlier times are ignored so the clock stays monotonic.
    pub fn advance_to(&mut self, now: Time) {
        if now > self.now {
            self.now = now;
        }
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Time {
        self.now
    }
}

//
// ===============================
// MARK: Sample-domain clock
// ===============================
//

/// Clock advanced by rendered audio frames.
///
/// This struct:
/// - counts absolute sample position
/// - derives seconds from the sample rate
/// - is advanced once per rendered block
#[derive(Debug, Clone, Copy)]
pub struct SampleClock {
    /// Absolute sample position
    sample_pos: u64,

    /// Sample rate (Hz)
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_pos: 0,
            sample_rate,
        }
    }

    /// Advance by a number of rendered frames.
    pub fn advance_samples(&mut self, frames: usize) {
        self.sample_pos += frames as u64;
    }

    #[inline]
    pub fn sample_position(&self) -> u64 {
        self.sample_pos
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Absolute time in seconds.
    #[inline]
    pub fn seconds(&self) -> Time {
        self.sample_pos as f64 / self.sample_rate
    }

    /// Sample index at which an absolute time falls, rounded down.
    #[inline]
    pub fn sample_at(&self, time: Time) -> u64 {
        (time.max(0.0) * self.sample_rate) as u64
    }
}

impl Clock for SampleClock {
    #[inline]
    fn now(&self) -> Time {
        self.seconds()
    }
}

//
// ===============================
// MARK: Timeline guards
// ===============================
//

/// Check that `requested` does not lie in the already-rendered past.
pub fn not_before(requested: Time, now: Time) -> ScheduleResult<Time> {
    if requested < now {
        Err(ScheduleError::PastTime { requested, now })
    } else {
        Ok(requested)
    }
}

/// Like [`not_before`], but recovers from a violation.
///
/// Debug builds fail fast. Release builds log a warning and clamp to `now`.
pub fn clamp_to_now(requested: Time, now: Time) -> Time {
    match not_before(requested, now) {
        Ok(t) => t,
        Err(e) => {
            debug_assert!(false, "{}", e);
            log::warn!("{}; clamping to now", e);
            now
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_never_goes_backwards() {
        let mut clock = ManualClock::new();
        clock.advance_to(1.25);
        clock.advance_to(0.5);
        assert_eq!(clock.now(), 1.25);
    }

    #[test]
    fn sample_clock_tracks_rendered_frames() {
        let mut clock = SampleClock::new(48_000.0);
        clock.advance_samples(24_000);
        assert_eq!(clock.sample_position(), 24_000);
        assert_eq!(clock.now(), 0.5);
        assert_eq!(clock.sample_at(0.25), 12_000);
    }

    #[test]
    fn past_times_are_rejected() {
        assert_eq!(not_before(1.0, 1.0), Ok(1.0));
        assert_eq!(
            not_before(0.9, 1.0),
            Err(ScheduleError::PastTime {
                requested: 0.9,
                now: 1.0
            })
        );
    }

    #[test]
    fn future_times_pass_through_the_clamp() {
        assert_eq!(clamp_to_now(2.0, 1.0), 2.0);
    }
}
