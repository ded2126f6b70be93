// src/voice.rs

use crate::automation::AutomationEnvelope;
use crate::backend::ToneGenerator;
use crate::clock::Time;
use crate::config::Timing;

/// Amplitude a note reaches when no velocity scaling is applied.
pub const DEFAULT_PEAK: f64 = 0.5;

/// A single tone generator together with its pitch and amplitude envelopes.
///
/// A voice does NOT own routing.
/// It feeds whichever output route it was created against.
pub struct Voice {
    generator: Box<dyn ToneGenerator>,
    frequency: AutomationEnvelope,
    gain: AutomationEnvelope,

    natural_release: Time,
    damp_time: Time,

    started: bool,
}

impl Voice {
    pub fn new(mut generator: Box<dyn ToneGenerator>, timing: &Timing) -> Self {
        let frequency = AutomationEnvelope::new(generator.frequency_param(), 0.0);
        let gain = AutomationEnvelope::new(generator.gain_param(), 0.0);
        Self {
            generator,
            frequency,
            gain,
            natural_release: timing.natural_release,
            damp_time: timing.damp_time,
            started: false,
        }
    }

    /// Start the generator. Must happen once, before any note is scheduled.
    pub fn start(&mut self) {
        debug_assert!(!self.started, "voice started twice");
        if !self.started {
            self.generator.start();
            self.started = true;
        }
    }

    /// Sound `frequency` at `t` and let it decay naturally.
    ///
    /// Returns the moment the decay reaches silence.
    pub fn note_at(&mut self, t: Time, frequency: f64, peak: f64) -> Time {
        debug_assert!(self.started, "note scheduled on a voice that was never started");
        let end = t + self.natural_release;
        self.frequency.jump_at(t, frequency);
        self.gain.jump_at(t, peak);
        self.gain.curve(t, end, 0.0);
        end
    }

    /// Damp the voice to silence starting at `t`.
    pub fn mute_at(&mut self, t: Time) {
        self.gain.line(t, t + self.damp_time, 0.0);
    }

    /// Freeze the pitch at `t` and restart the natural decay from there.
    pub fn ring_out_at(&mut self, t: Time) {
        self.frequency.truncate_at(t);
        self.gain.curve(t, t + self.natural_release, 0.0);
    }

    #[inline]
    pub fn gain_at(&self, t: Time) -> f64 {
        self.gain.value_at(t)
    }

    #[inline]
    pub fn frequency_at(&self, t: Time) -> f64 {
        self.frequency.value_at(t)
    }

    /// Stop the generator for good.
    pub(crate) fn stop(&mut self) {
        if self.started {
            self.generator.stop();
            self.started = false;
        }
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("frequency", &self.frequency)
            .field("gain", &self.gain)
            .field("started", &self.started)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::AutomationOp;
    use crate::backend::{
        AudioBackend, CommandBackend, GraphCommand, ParamKind, SilentBackend, Waveform,
    };

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn silent_voice() -> Voice {
        let mut backend = SilentBackend::new();
        let route = backend.route();
        let mut voice = Voice::new(backend.tone(Waveform::Sine, route.id()), &Timing::default());
        voice.start();
        voice
    }

    #[test]
    fn note_jumps_to_peak_and_decays() {
        let mut voice = silent_voice();
        let end = voice.note_at(1.0, 440.0, DEFAULT_PEAK);

        assert!(close(end, 2.5));
        assert_eq!(voice.frequency_at(1.0), 440.0);
        assert!(close(voice.gain_at(1.0), 0.5));
        assert!(voice.gain_at(1.5) < 0.5);
        assert_eq!(voice.gain_at(2.5), 0.0);
        assert_eq!(voice.gain_at(0.5), 0.0);
    }

    #[test]
    fn mute_ramps_from_the_current_level() {
        let mut voice = silent_voice();
        voice.note_at(0.0, 220.0, 0.8);
        let level = voice.gain_at(0.3);

        voice.mute_at(0.3);

        assert!(close(voice.gain_at(0.3), level));
        assert!(close(voice.gain_at(0.301), level / 2.0));
        assert_eq!(voice.gain_at(0.31), 0.0);
        assert_eq!(voice.gain_at(1.0), 0.0);
    }

    #[test]
    fn ring_out_freezes_pitch_and_restarts_decay() {
        let mut voice = silent_voice();
        voice.note_at(0.0, 330.0, 0.5);
        let level = voice.gain_at(0.5);

        voice.ring_out_at(0.5);

        assert_eq!(voice.frequency_at(0.75), 330.0);
        assert!(close(voice.gain_at(0.5), level));
        assert!(voice.gain_at(1.9) > 0.0);
        assert_eq!(voice.gain_at(2.0), 0.0);
    }

    #[test]
    fn ring_out_during_the_damp_holds_the_rendered_ramp() {
        let mut backend = CommandBackend::new();
        let host = backend.clone();
        let route = backend.route();
        let mut voice = Voice::new(backend.tone(Waveform::Sine, route.id()), &Timing::default());
        voice.start();
        voice.note_at(0.0, 440.0, 0.5);
        voice.mute_at(0.3);
        host.drain();

        voice.ring_out_at(0.305);

        let gain_ops: Vec<AutomationOp> = host
            .drain()
            .into_iter()
            .filter_map(|c| match c {
                GraphCommand::Automate {
                    param: ParamKind::Gain,
                    op,
                    ..
                } => Some(op),
                _ => None,
            })
            .collect();
        assert_eq!(
            gain_ops.first(),
            Some(&AutomationOp::CancelAndHoldAtTime { time: 0.305 })
        );
        assert!(close(voice.gain_at(0.305), voice.gain_at(0.3) / 2.0));
    }

    #[test]
    fn start_and_stop_reach_the_backend() {
        let mut backend = CommandBackend::new();
        let host = backend.clone();
        let route = backend.route();
        let mut voice = Voice::new(backend.tone(Waveform::Square, route.id()), &Timing::default());

        voice.start();
        voice.stop();
        voice.stop();

        let commands = host.drain();
        let starts = commands
            .iter()
            .filter(|c| matches!(c, GraphCommand::Start { .. }))
            .count();
        let stops = commands
            .iter()
            .filter(|c| matches!(c, GraphCommand::Stop { .. }))
            .count();
        assert_eq!(starts, 1);
        assert_eq!(stops, 1);
    }
}
