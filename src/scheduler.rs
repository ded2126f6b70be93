// src/scheduler.rs

use crate::alarm_registry::AlarmRegistry;
use crate::backend::AudioBackend;
use crate::clock::{Clock, Time, clamp_to_now};
use crate::config::Timing;
use crate::event::{AudioChange, Notification};
use crate::instrument::InstrumentRegistry;
use crate::note_registry::NoteRegistry;
use crate::observer::Observer;

/// Whether the scheduler needs to be polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing sounding, no alarms pending.
    Idle,
    /// Work pending; the host must keep calling `update`.
    Running,
}

/// What the host should do after `apply` or `update`.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wake {
    /// Stop polling until the next batch.
    Idle,
    /// Call `update` again. Nothing changes before `next_deadline`.
    Poll { next_deadline: Time },
}

impl Wake {
    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self, Wake::Idle)
    }
}

/// Owns every tracked note and alarm and decides when they retire.
///
/// This struct is single-threaded.
/// `apply` and `update` run to completion and never block.
pub struct Scheduler<C: Clock, O: Observer> {
    clock: C,
    observer: O,
    backend: Box<dyn AudioBackend>,
    instruments: InstrumentRegistry,
    timing: Timing,

    notes: NoteRegistry,
    alarms: AlarmRegistry,

    state: SchedulerState,
}

impl<C: Clock, O: Observer> Scheduler<C, O> {
    /// Scheduler with default timing and the standard instruments.
    pub fn new(clock: C, observer: O, backend: Box<dyn AudioBackend>) -> Self {
        Self {
            clock,
            observer,
            backend,
            instruments: InstrumentRegistry::standard(),
            timing: Timing::default(),
            notes: NoteRegistry::new(),
            alarms: AlarmRegistry::new(),
            state: SchedulerState::Idle,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_instruments(mut self, instruments: InstrumentRegistry) -> Self {
        self.instruments = instruments;
        self
    }

    // ═══════════════════════════════════════════════════════════════
    // Batch application
    // ═══════════════════════════════════════════════════════════════

    /// Apply a batch of changes, in order.
    pub fn apply(&mut self, changes: &[AudioChange]) -> Wake {
        let now = self.clock.now();
        let had_notes = !self.notes.is_empty();

        log::debug!("applying {} change(s) at {:.4}s", changes.len(), now);

        for change in changes {
            self.apply_change(change, now);
        }

        self.notes.sort();
        self.alarms.sort();

        if !had_notes && !self.notes.is_empty() {
            self.observer.notify(Notification::PlaybackStarted);
        }

        match self.state {
            SchedulerState::Idle if self.has_work() => {
                log::debug!("scheduler running");
                self.state = SchedulerState::Running;
                self.update()
            }
            _ => self.wake(),
        }
    }

    fn apply_change(&mut self, change: &AudioChange, now: Time) {
        let timing = self.timing;
        match *change {
            AudioChange::Mute { t } => self.notes.mute_all(t, now, &timing),

            AudioChange::Cancel { t } => self.notes.cancel_all(t, now, &timing),

            AudioChange::NoteOn {
                t,
                frequency,
                kind,
                velocity,
            } => {
                let t = clamp_to_now(t, now);
                self.notes.mute_frequency(t, frequency, now, &timing);

                match self.instruments.get(kind) {
                    Ok(instrument) => {
                        let note =
                            instrument.play(self.backend.as_mut(), &timing, velocity, t, frequency);
                        log::trace!(
                            "note on {:?} {:.2}Hz at {:.4}s, expires {:.4}s",
                            kind,
                            frequency,
                            t,
                            note.expiration()
                        );
                        self.notes.push(note);
                    }
                    Err(e) => log::warn!("{}; note dropped", e),
                }
            }

            AudioChange::NoteOff { t, frequency } => {
                self.notes.mute_frequency(t, frequency, now, &timing)
            }

            AudioChange::Alarm { t } => self.alarms.push(t),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Maintenance sweep
    // ═══════════════════════════════════════════════════════════════

    /// Retire expired notes, fire due alarms and report whether to keep polling.
    pub fn update(&mut self) -> Wake {
        let now = self.clock.now();

        let had_notes = !self.notes.is_empty();
        let released = self.notes.sweep(now);
        if released > 0 {
            log::trace!("released {} note(s) at {:.4}s", released, now);
        }

        if had_notes {
            if self.notes.is_empty() {
                self.observer.notify(Notification::PlaybackStopped);
                self.observer.notify(Notification::MetersShouldClear);
            } else {
                self.observer.notify(Notification::MetersShouldUpdate);
            }
        }

        if self.alarms.is_due(now) {
            self.observer.notify(Notification::ClockTick(now));
            self.alarms.sweep(now);
        }

        let wake = self.wake();
        if wake.is_idle() && self.state == SchedulerState::Running {
            log::debug!("scheduler idle at {:.4}s", now);
            self.state = SchedulerState::Idle;
        }
        wake
    }

    fn has_work(&self) -> bool {
        !self.notes.is_empty() || !self.alarms.is_empty()
    }

    fn wake(&self) -> Wake {
        let deadline = match (self.notes.next_expiration(), self.alarms.next()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        match deadline {
            Some(next_deadline) => Wake::Poll { next_deadline },
            None => Wake::Idle,
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════

    #[inline]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[inline]
    pub fn now(&self) -> Time {
        self.clock.now()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Advance the clock between calls.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Output level at the current clock time, for meters.
    pub fn level(&self) -> f64 {
        self.notes.level_at(self.clock.now())
    }

    pub fn notes(&self) -> &NoteRegistry {
        &self.notes
    }

    pub fn alarms(&self) -> &AlarmRegistry {
        &self.alarms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CommandBackend, GraphCommand, SilentBackend};
    use crate::clock::ManualClock;
    use crate::instrument::{self, VoiceKind};
    use crate::note::{MuteState, Note};

    type TestScheduler = Scheduler<ManualClock, Vec<Notification>>;

    fn scheduler() -> TestScheduler {
        Scheduler::new(ManualClock::new(), Vec::new(), Box::new(SilentBackend::new()))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn note_on(t: Time, frequency: f64) -> AudioChange {
        AudioChange::NoteOn {
            t,
            frequency,
            kind: VoiceKind::Guitar,
            velocity: 1.0,
        }
    }

    fn count(notifications: &[Notification], wanted: Notification) -> usize {
        notifications.iter().filter(|n| **n == wanted).count()
    }

    fn expirations(s: &TestScheduler) -> Vec<Time> {
        s.notes().iter().map(Note::expiration).collect()
    }

    #[test]
    fn note_on_starts_playback() {
        let mut s = scheduler();

        let wake = s.apply(&[note_on(0.0, 440.0)]);

        assert_eq!(expirations(&s), vec![1.5]);
        assert_eq!(wake, Wake::Poll { next_deadline: 1.5 });
        assert_eq!(s.state(), SchedulerState::Running);
        assert_eq!(count(s.observer(), Notification::PlaybackStarted), 1);
    }

    #[test]
    fn note_off_lands_after_the_safety_margin() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(0.0, 440.0)]);

        s.clock_mut().advance_to(0.5);
        let _ = s.apply(&[AudioChange::NoteOff {
            t: 0.5,
            frequency: 440.0,
        }]);

        let expiration = expirations(&s)[0];
        assert!(close(expiration, 0.56));
    }

    #[test]
    fn note_off_for_another_pitch_is_ignored() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(0.0, 440.0)]);

        let _ = s.apply(&[AudioChange::NoteOff {
            t: 0.5,
            frequency: 441.0,
        }]);

        assert_eq!(expirations(&s), vec![1.5]);
    }

    #[test]
    fn cancel_without_pending_mute_changes_nothing() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(0.0, 440.0)]);
        s.clock_mut().advance_to(0.1);

        let _ = s.apply(&[AudioChange::Cancel { t: 0.2 }]);

        assert_eq!(expirations(&s), vec![1.5]);
        assert_eq!(
            s.notes().iter().next().map(Note::mute_state),
            Some(MuteState::Sounding)
        );
    }

    #[test]
    fn mute_then_cancel_restores_the_note() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(0.0, 440.0)]);
        s.clock_mut().advance_to(0.1);

        let _ = s.apply(&[AudioChange::Mute { t: 0.5 }, AudioChange::Cancel { t: 0.3 }]);

        assert_eq!(expirations(&s), vec![1.5]);
    }

    #[test]
    fn cancel_at_the_mute_time_restores_the_note() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(0.0, 440.0)]);
        s.clock_mut().advance_to(0.1);

        let _ = s.apply(&[AudioChange::Mute { t: 0.5 }, AudioChange::Cancel { t: 0.5 }]);

        assert_eq!(expirations(&s), vec![1.5]);
        assert_eq!(
            s.notes().iter().next().map(Note::mute_state),
            Some(MuteState::Sounding)
        );
    }

    #[test]
    fn expirations_are_descending_after_every_batch() {
        let mut s = scheduler();
        let _ = s.apply(&[
            note_on(0.2, 220.0),
            note_on(0.0, 330.0),
            note_on(0.4, 440.0),
            AudioChange::NoteOff {
                t: 0.3,
                frequency: 440.0,
            },
        ]);

        // The 440Hz note was muted before it began and retired in the
        // sweep that `apply` ran.
        assert!(s.notes().is_sorted());
        assert_eq!(s.notes().len(), 2);
        assert_eq!(s.notes().next_expiration(), Some(1.5));
    }

    #[test]
    fn repeated_pitch_mutes_the_previous_note() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(0.0, 440.0)]);

        let _ = s.apply(&[note_on(1.0, 440.0)]);

        assert_eq!(s.notes().len(), 2);
        let exps = expirations(&s);
        assert_eq!(exps[0], 2.5);
        assert!(close(exps[1], 1.02));
    }

    #[test]
    fn notes_retire_and_scheduler_goes_idle() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(0.0, 440.0)]);

        s.clock_mut().advance_to(1.0);
        assert_eq!(s.update(), Wake::Poll { next_deadline: 1.5 });

        s.clock_mut().advance_to(1.5);
        assert_eq!(s.update(), Wake::Idle);
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(s.notes().is_empty());

        let seen = s.observer();
        assert_eq!(count(seen, Notification::PlaybackStarted), 1);
        assert_eq!(count(seen, Notification::PlaybackStopped), 1);
        assert_eq!(seen.last(), Some(&Notification::MetersShouldClear));
    }

    #[test]
    fn idle_update_is_silent() {
        let mut s = scheduler();
        assert_eq!(s.update(), Wake::Idle);
        assert!(s.observer().is_empty());
    }

    #[test]
    fn note_muted_before_its_start_retires_on_the_next_sweep() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(1.0, 440.0)]);

        let wake = s.apply(&[AudioChange::Mute { t: 0.5 }]);
        assert_eq!(wake, Wake::Poll { next_deadline: 0.0 });

        assert_eq!(s.update(), Wake::Idle);
        assert_eq!(count(s.observer(), Notification::PlaybackStopped), 1);
    }

    #[test]
    fn alarms_tick_once_per_sweep() {
        let mut s = scheduler();
        let wake = s.apply(&[AudioChange::Alarm { t: 2.0 }, AudioChange::Alarm { t: 1.0 }]);
        assert_eq!(wake, Wake::Poll { next_deadline: 1.0 });
        assert!(s.observer().is_empty());

        s.clock_mut().advance_to(0.5);
        let _ = s.update();
        assert!(s.observer().is_empty());

        s.clock_mut().advance_to(2.5);
        assert_eq!(s.update(), Wake::Idle);
        assert_eq!(s.observer().as_slice(), &[Notification::ClockTick(2.5)]);
        assert!(s.alarms().is_empty());
    }

    #[test]
    fn due_alarm_fires_during_apply() {
        let mut s = scheduler();
        s.clock_mut().advance_to(1.0);

        let wake = s.apply(&[AudioChange::Alarm { t: 1.0 }]);

        assert_eq!(wake, Wake::Idle);
        assert_eq!(s.observer().as_slice(), &[Notification::ClockTick(1.0)]);
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[test]
    fn deadline_is_the_earliest_pending_work() {
        let mut s = scheduler();
        let wake = s.apply(&[note_on(0.0, 440.0), AudioChange::Alarm { t: 0.75 }]);
        assert_eq!(wake, Wake::Poll { next_deadline: 0.75 });
    }

    #[test]
    fn playback_started_only_on_first_note() {
        let mut s = scheduler();
        let _ = s.apply(&[note_on(0.0, 440.0)]);
        let _ = s.apply(&[note_on(0.1, 550.0)]);
        assert_eq!(count(s.observer(), Notification::PlaybackStarted), 1);
    }

    #[test]
    fn unregistered_instrument_drops_the_note() {
        let mut registry = InstrumentRegistry::new();
        registry.register(Box::new(instrument::piano()));
        let mut s = scheduler().with_instruments(registry);

        let wake = s.apply(&[note_on(0.0, 440.0)]);

        assert_eq!(wake, Wake::Idle);
        assert!(s.notes().is_empty());
        assert!(s.observer().is_empty());
    }

    #[test]
    fn custom_timing_shapes_expiration() {
        let timing = Timing::default().with_natural_release(3.0);
        let mut s = scheduler().with_timing(timing);
        let _ = s.apply(&[note_on(0.0, 440.0)]);
        assert_eq!(expirations(&s), vec![3.0]);
    }

    #[test]
    fn retired_notes_free_their_graph_nodes() {
        let backend = CommandBackend::new();
        let host = backend.clone();
        let mut s = Scheduler::new(ManualClock::new(), (), Box::new(backend));

        let _ = s.apply(&[note_on(0.0, 440.0)]);
        host.drain();
        s.clock_mut().advance_to(2.0);
        let _ = s.update();

        let commands = host.drain();
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, GraphCommand::Stop { .. }))
        );
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, GraphCommand::Disconnect { .. }))
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "clock is already at")]
    fn note_on_in_the_past_fails_fast_in_debug() {
        let mut s = scheduler();
        s.clock_mut().advance_to(1.0);
        let _ = s.apply(&[note_on(0.5, 440.0)]);
    }
}
