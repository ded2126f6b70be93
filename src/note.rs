// src/note.rs
//
// One sounding note: its voices, the output route they are mixed through,
// and the mute bookkeeping that lets a mute be taken back.

use crate::automation::AutomationEnvelope;
use crate::backend::OutputRoute;
use crate::clock::Time;
use crate::config::Timing;
use crate::voice::Voice;

/// Where a note stands in the mute protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MuteState {
    /// Playing out its natural decay.
    Sounding,

    /// A fader ramp to silence starts at `mute_time`.
    PendingMute {
        mute_time: Time,
        pre_mute_expiration: Time,
    },

    /// Silenced before it ever started.
    Muted { pre_mute_expiration: Time },
}

impl MuteState {
    /// Expiration the note had before the current mute episode began.
    #[inline]
    pub fn pre_mute_expiration(&self) -> Option<Time> {
        match *self {
            MuteState::Sounding => None,
            MuteState::PendingMute {
                pre_mute_expiration,
                ..
            }
            | MuteState::Muted {
                pre_mute_expiration,
            } => Some(pre_mute_expiration),
        }
    }
}

/// A note tracked by the scheduler from note-on until it has rung out.
pub struct Note {
    frequency: f64,
    start: Time,
    expiration: Time,

    voices: Vec<Voice>,
    route: Box<dyn OutputRoute>,
    /// Gain of `route`.
    fader: AutomationEnvelope,

    mute: MuteState,
}

impl Note {
    /// Wrap already started voices feeding `route`.
    pub fn new(
        frequency: f64,
        start: Time,
        expiration: Time,
        voices: Vec<Voice>,
        mut route: Box<dyn OutputRoute>,
    ) -> Self {
        let fader = AutomationEnvelope::new(route.gain_param(), 1.0);
        Self {
            frequency,
            start,
            expiration,
            voices,
            route,
            fader,
            mute: MuteState::Sounding,
        }
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    #[inline]
    pub fn start(&self) -> Time {
        self.start
    }

    /// Moment after which the note is guaranteed silent.
    #[inline]
    pub fn expiration(&self) -> Time {
        self.expiration
    }

    #[inline]
    pub fn mute_state(&self) -> MuteState {
        self.mute
    }

    #[inline]
    pub fn is_expired(&self, now: Time) -> bool {
        self.expiration <= now
    }

    /// Fader level at `t`.
    pub fn fader_at(&self, t: Time) -> f64 {
        self.fader.value_at(t)
    }

    pub fn fader(&self) -> &AutomationEnvelope {
        &self.fader
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Loudest voice level at `t`, before the fader.
    pub fn level_at(&self, t: Time) -> f64 {
        self.voices
            .iter()
            .map(|v| v.gain_at(t))
            .fold(0.0, f64::max)
    }

    /// Silence the note at `t`, or as soon as the renderer allows.
    ///
    /// A mute only ever moves silence earlier. Returns whether anything
    /// changed.
    pub fn mute_at(&mut self, t: Time, now: Time, timing: &Timing) -> bool {
        let mut effective = now + timing.safety_margin;
        if t > self.start && effective < t {
            effective = t;
        }

        let prior = match self.mute {
            MuteState::Sounding => self.expiration,
            MuteState::PendingMute { mute_time, .. } => mute_time,
            MuteState::Muted { .. } => 0.0,
        };
        if effective >= prior {
            return false;
        }

        let pre_mute_expiration = self.mute.pre_mute_expiration().unwrap_or(self.expiration);

        if effective <= self.start {
            // Not audible yet, so there is nothing to fade.
            self.fader.reset(0.0);
            self.expiration = 0.0;
            self.mute = MuteState::Muted {
                pre_mute_expiration,
            };
            log::trace!("note {:.2}Hz muted before its start", self.frequency);
        } else {
            self.fader.jump_at(effective, 1.0);
            self.fader
                .line(effective, effective + timing.mute_release, 0.0);
            self.expiration = effective + timing.mute_tail();
            self.mute = MuteState::PendingMute {
                mute_time: effective,
                pre_mute_expiration,
            };
            log::trace!(
                "note {:.2}Hz fading out at {:.4}s",
                self.frequency,
                effective
            );
        }
        true
    }

    /// Take back a mute that has not begun by `t`.
    ///
    /// A cancel at or before the note's start removes the note instead.
    pub fn cancel_at(&mut self, t: Time, now: Time, timing: &Timing) -> bool {
        if t <= self.start {
            return self.mute_at(t, now, timing);
        }

        match self.mute {
            MuteState::PendingMute {
                mute_time,
                pre_mute_expiration,
            } if mute_time >= t => {
                self.fader.reset(1.0);
                self.expiration = pre_mute_expiration;
                self.mute = MuteState::Sounding;
                log::trace!("note {:.2}Hz mute cancelled", self.frequency);
                true
            }
            _ => false,
        }
    }

    /// Let every voice ring out from `t` with its pitch frozen.
    pub fn ring_out_at(&mut self, t: Time, timing: &Timing) {
        for voice in &mut self.voices {
            voice.ring_out_at(t);
        }
        if matches!(self.mute, MuteState::Sounding) {
            self.expiration = self.expiration.max(t + timing.natural_release);
        }
    }

    /// Tear the note down. Consumes it so this happens exactly once.
    pub fn release(mut self) {
        for voice in &mut self.voices {
            voice.stop();
        }
        self.route.disconnect();
    }
}

impl std::fmt::Debug for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Note")
            .field("frequency", &self.frequency)
            .field("start", &self.start)
            .field("expiration", &self.expiration)
            .field("mute", &self.mute)
            .field("voices", &self.voices.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::Automation;
    use crate::backend::{AudioBackend, CommandBackend, GraphCommand, SilentBackend, Waveform};
    use crate::voice::DEFAULT_PEAK;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn note_on(backend: &mut dyn AudioBackend, t: Time, frequency: f64) -> Note {
        let timing = Timing::default();
        let route = backend.route();
        let mut voice = Voice::new(backend.tone(Waveform::Sawtooth, route.id()), &timing);
        voice.start();
        let expiration = voice.note_at(t, frequency, DEFAULT_PEAK);
        Note::new(frequency, t, expiration, vec![voice], route)
    }

    #[test]
    fn mute_respects_the_safety_margin() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 440.0);

        assert!(note.mute_at(0.5, 0.5, &timing));

        assert!(close(note.expiration(), 0.56));
        match note.mute_state() {
            MuteState::PendingMute {
                mute_time,
                pre_mute_expiration,
            } => {
                assert!(close(mute_time, 0.54));
                assert_eq!(pre_mute_expiration, 1.5);
            }
            other => panic!("expected a pending mute, got {:?}", other),
        }
        assert_eq!(note.fader_at(0.5), 1.0);
        assert_eq!(note.fader_at(0.6), 0.0);
    }

    #[test]
    fn mute_prefers_a_later_requested_time() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 440.0);

        note.mute_at(1.0, 0.1, &timing);

        assert!(close(note.expiration(), 1.02));
    }

    #[test]
    fn mutes_only_move_silence_earlier() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 440.0);

        assert!(note.mute_at(0.8, 0.1, &timing));
        let after_first = note.expiration();

        assert!(!note.mute_at(1.0, 0.1, &timing));
        assert_eq!(note.expiration(), after_first);

        assert!(note.mute_at(0.5, 0.1, &timing));
        assert!(note.expiration() < after_first);
        assert_eq!(note.mute_state().pre_mute_expiration(), Some(1.5));
    }

    #[test]
    fn mute_after_natural_expiration_is_ignored() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 440.0);

        assert!(!note.mute_at(2.0, 1.6, &timing));
        assert_eq!(note.mute_state(), MuteState::Sounding);
        assert_eq!(note.expiration(), 1.5);
    }

    #[test]
    fn cancel_undoes_a_pending_mute() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 440.0);

        note.mute_at(0.5, 0.1, &timing);
        assert!(note.cancel_at(0.3, 0.1, &timing));

        assert_eq!(note.mute_state(), MuteState::Sounding);
        assert_eq!(note.expiration(), 1.5);
        assert_eq!(note.fader_at(0.7), 1.0);
        assert!(note.fader().automations().is_empty());
    }

    #[test]
    fn cancel_at_the_mute_time_restores_the_note() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 440.0);

        note.mute_at(0.5, 0.1, &timing);
        assert!(note.cancel_at(0.5, 0.1, &timing));

        assert_eq!(note.expiration(), 1.5);
        assert_eq!(note.mute_state(), MuteState::Sounding);
    }

    #[test]
    fn cancel_after_the_mute_began_is_ignored() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 440.0);

        note.mute_at(0.5, 0.1, &timing);
        assert!(!note.cancel_at(0.6, 0.1, &timing));
        assert!(close(note.expiration(), 0.52));
    }

    #[test]
    fn cancel_without_pending_mute_is_a_no_op() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 440.0);

        assert!(!note.cancel_at(0.2, 0.1, &timing));
        assert_eq!(note.expiration(), 1.5);
        assert_eq!(note.mute_state(), MuteState::Sounding);
    }

    #[test]
    fn mute_before_start_silences_immediately() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 1.0, 440.0);

        assert!(note.mute_at(0.5, 0.5, &timing));

        assert_eq!(note.expiration(), 0.0);
        assert_eq!(
            note.mute_state(),
            MuteState::Muted {
                pre_mute_expiration: 2.5
            }
        );
        assert_eq!(note.fader_at(1.0), 0.0);
        assert!(
            !note
                .fader()
                .automations()
                .iter()
                .any(|a| matches!(a, Automation::Line { .. }))
        );

        // Already silent: neither mute nor cancel can change it.
        assert!(!note.mute_at(0.5, 0.5, &timing));
        assert!(!note.cancel_at(1.5, 0.5, &timing));
        assert_eq!(note.expiration(), 0.0);
    }

    #[test]
    fn cancel_before_start_behaves_like_mute() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 1.0, 440.0);

        assert!(note.cancel_at(1.0, 0.5, &timing));
        assert_eq!(note.expiration(), 0.0);
    }

    #[test]
    fn ring_out_keeps_pitch_and_extends_decay() {
        let timing = Timing::default();
        let mut note = note_on(&mut SilentBackend::new(), 0.0, 261.63);

        note.ring_out_at(1.0, &timing);

        assert_eq!(note.expiration(), 2.5);
        assert_eq!(note.voices()[0].frequency_at(2.0), 261.63);
        assert!(note.level_at(1.5) > 0.0);
    }

    #[test]
    fn release_stops_voices_and_disconnects_route() {
        let mut backend = CommandBackend::new();
        let host = backend.clone();
        let note = note_on(&mut backend, 0.0, 440.0);
        host.drain();

        note.release();

        let commands = host.drain();
        assert!(matches!(commands[0], GraphCommand::Stop { .. }));
        assert!(matches!(commands[1], GraphCommand::Disconnect { .. }));
        assert_eq!(commands.len(), 2);
    }
}
