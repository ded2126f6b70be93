// src/error.rs
//
// Errors raised at the edges of the scheduler.
//
// The scheduling core itself never fails: unknown pitches are no-ops and
// past timestamps are clamped. These errors surface where host input is
// parsed or where a timeline guard is checked explicitly.

use crate::clock::Time;
use crate::instrument::VoiceKind;

/// Error raised while validating host input.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// Automation was requested for a moment the renderer already consumed.
    PastTime { requested: Time, now: Time },

    /// A voice kind name that no preset answers to.
    UnknownVoiceKind(String),

    /// A numeric voice kind code outside the known range.
    UnknownVoiceCode(u32),

    /// A note-on for a voice kind with no instrument registered.
    UnregisteredInstrument(VoiceKind),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::PastTime { requested, now } => {
                write!(
                    f,
                    "Automation requested at {:.4}s but the clock is already at {:.4}s",
                    requested, now
                )
            }
            ScheduleError::UnknownVoiceKind(name) => {
                write!(f, "Unknown voice kind \"{}\"", name)
            }
            ScheduleError::UnknownVoiceCode(code) => {
                write!(f, "Unknown voice kind code {}", code)
            }
            ScheduleError::UnregisteredInstrument(kind) => {
                write!(f, "No instrument registered for {:?}", kind)
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Result of validating host input.
pub type ScheduleResult<T> = Result<T, ScheduleError>;
