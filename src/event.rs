// src/event.rs

use crate::clock::Time;
use crate::instrument::VoiceKind;

/// ===============================
/// Inbound audio changes
/// ===============================

/// One change requested by the host.
///
/// Changes are delivered in batches and applied strictly in order.
/// All times are absolute clock seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioChange {
    /// Silence every note from `t`.
    Mute { t: Time },

    /// Take back mutes that have not begun by `t`.
    Cancel { t: Time },

    NoteOn {
        t: Time,
        frequency: f64,
        kind: VoiceKind,
        velocity: f64,
    },

    /// Silence notes sounding exactly `frequency` from `t`.
    NoteOff { t: Time, frequency: f64 },

    /// Request a clock tick once `t` is reached.
    Alarm { t: Time },
}

impl AudioChange {
    /// The time the change refers to.
    pub fn time(&self) -> Time {
        match *self {
            AudioChange::Mute { t }
            | AudioChange::Cancel { t }
            | AudioChange::NoteOn { t, .. }
            | AudioChange::NoteOff { t, .. }
            | AudioChange::Alarm { t } => t,
        }
    }
}

/// ===============================
/// Outbound notifications
/// ===============================

/// What the scheduler tells the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    /// The first note of a busy stretch was added.
    PlaybackStarted,

    /// The last note was retired.
    PlaybackStopped,

    /// Levels changed; meters should be redrawn.
    MetersShouldUpdate,

    /// Nothing is sounding; meters should drop to zero.
    MetersShouldClear,

    /// An alarm fired. Carries the clock time it was observed at.
    ClockTick(Time),
}

impl Notification {
    /// Numeric code used across FFI.
    pub fn code(&self) -> u32 {
        match self {
            Notification::PlaybackStarted => 0,
            Notification::PlaybackStopped => 1,
            Notification::MetersShouldUpdate => 2,
            Notification::MetersShouldClear => 3,
            Notification::ClockTick(_) => 4,
        }
    }

    /// Pack as `[code, time]`. Only ticks carry a time.
    pub fn encode(&self) -> [f64; 2] {
        let time = match self {
            Notification::ClockTick(t) => *t,
            _ => 0.0,
        };
        [self.code() as f64, time]
    }
}
