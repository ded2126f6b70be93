//! Host-facing session shared by the platform bindings.
//!
//! A host (browser page, iOS app, demo binary) owns one [`HostSession`]:
//!
//! - it pushes the audio clock in with [`HostSession::set_time`]
//! - it queues changes into a batch and commits them with [`HostSession::commit`]
//! - it polls [`HostSession::update`] while the returned [`Wake`] says so
//! - it drains graph commands and notifications after every call
//!
//! # Usage
//!
//! ```ignore
//! let mut session = HostSession::new(HostConfig::default());
//!
//! session.set_time(ctx.current_time);
//! session.note_on(0.1, 440.0, VoiceKind::Piano, 0.8);
//! let mut wake = session.commit();
//!
//! while !wake.is_idle() {
//!     replay(session.drain_commands());
//!     session.set_time(ctx.current_time);
//!     wake = session.update();
//! }
//! ```

use crate::backend::{CommandBackend, ENCODED_COMMAND_WORDS, GraphCommand};
use crate::clock::{ManualClock, Time};
use crate::config::HostConfig;
use crate::error::ScheduleResult;
use crate::event::{AudioChange, Notification};
use crate::instrument::VoiceKind;
use crate::scheduler::{Scheduler, SchedulerState, Wake};

/// One scheduler driven by an external clock, with its outputs queued.
pub struct HostSession {
    scheduler: Scheduler<ManualClock, Vec<Notification>>,
    commands: CommandBackend,
    pending: Vec<AudioChange>,
    config: HostConfig,
    wake: Wake,
}

impl HostSession {
    pub fn new(config: HostConfig) -> Self {
        let commands = CommandBackend::new();
        let scheduler = Scheduler::new(
            ManualClock::new(),
            Vec::new(),
            Box::new(commands.clone()),
        )
        .with_timing(config.timing);

        Self {
            scheduler,
            commands,
            pending: Vec::with_capacity(16),
            config,
            wake: Wake::Idle,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════
    // Clock
    // ═══════════════════════════════════════════════════════════════

    /// Report the host clock in seconds. Earlier times are ignored.
    pub fn set_time(&mut self, seconds: Time) {
        self.scheduler.clock_mut().advance_to(seconds);
    }

    /// Report the host clock as a rendered frame count.
    pub fn set_frame(&mut self, frame: u64) {
        self.set_time(frame as f64 / self.config.sample_rate);
    }

    #[inline]
    pub fn now(&self) -> Time {
        self.scheduler.now()
    }

    // ═══════════════════════════════════════════════════════════════
    // Batch building
    // ═══════════════════════════════════════════════════════════════

    pub fn mute(&mut self, t: Time) {
        self.pending.push(AudioChange::Mute { t });
    }

    pub fn cancel(&mut self, t: Time) {
        self.pending.push(AudioChange::Cancel { t });
    }

    pub fn note_on(&mut self, t: Time, frequency: f64, kind: VoiceKind, velocity: f64) {
        self.pending.push(AudioChange::NoteOn {
            t,
            frequency,
            kind,
            velocity,
        });
    }

    /// Queue a note-on naming its voice kind, e.g. `"piano"`.
    pub fn note_on_named(
        &mut self,
        t: Time,
        frequency: f64,
        kind: &str,
        velocity: f64,
    ) -> ScheduleResult<()> {
        let kind = kind.parse()?;
        self.note_on(t, frequency, kind, velocity);
        Ok(())
    }

    /// Queue a note-on using a numeric voice kind code.
    pub fn note_on_code(
        &mut self,
        t: Time,
        frequency: f64,
        code: u32,
        velocity: f64,
    ) -> ScheduleResult<()> {
        let kind = VoiceKind::from_code(code)?;
        self.note_on(t, frequency, kind, velocity);
        Ok(())
    }

    pub fn note_off(&mut self, t: Time, frequency: f64) {
        self.pending.push(AudioChange::NoteOff { t, frequency });
    }

    pub fn alarm(&mut self, t: Time) {
        self.pending.push(AudioChange::Alarm { t });
    }

    /// Number of changes queued for the next commit.
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    /// Apply the queued batch.
    pub fn commit(&mut self) -> Wake {
        let batch = std::mem::take(&mut self.pending);
        self.wake = self.scheduler.apply(&batch);
        self.pending = batch;
        self.pending.clear();
        self.wake
    }

    /// Run one maintenance sweep.
    pub fn update(&mut self) -> Wake {
        self.wake = self.scheduler.update();
        self.wake
    }

    /// Result of the most recent `commit` or `update`.
    pub fn wake(&self) -> Wake {
        self.wake
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.state() == SchedulerState::Running
    }

    pub fn active_notes(&self) -> usize {
        self.scheduler.notes().len()
    }

    pub fn pending_alarms(&self) -> usize {
        self.scheduler.alarms().len()
    }

    // ═══════════════════════════════════════════════════════════════
    // Draining
    // ═══════════════════════════════════════════════════════════════

    pub fn drain_commands(&mut self) -> Vec<GraphCommand> {
        self.commands.drain()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(self.scheduler.observer_mut())
    }

    /// Number of graph commands waiting to be drained.
    pub fn pending_commands(&self) -> usize {
        self.commands.pending()
    }

    /// Number of notifications waiting to be drained.
    pub fn pending_notifications(&self) -> usize {
        self.scheduler.observer().len()
    }

    /// Drain commands as consecutive fixed-width records.
    pub fn drain_commands_encoded(&mut self) -> Vec<f64> {
        self.drain_commands_encoded_up_to(usize::MAX)
    }

    /// Drain at most `max` commands as fixed-width records.
    ///
    /// Commands beyond `max` stay queued for the next call.
    pub fn drain_commands_encoded_up_to(&mut self, max: usize) -> Vec<f64> {
        let commands = self.commands.drain_up_to(max);
        let mut out = Vec::with_capacity(commands.len() * ENCODED_COMMAND_WORDS);
        for command in &commands {
            out.extend_from_slice(&command.encode());
        }
        out
    }

    /// Drain notifications as consecutive `[code, time]` pairs.
    pub fn drain_notifications_encoded(&mut self) -> Vec<f64> {
        self.drain_notifications_encoded_up_to(usize::MAX)
    }

    /// Drain at most `max` notifications as `[code, time]` pairs.
    ///
    /// Notifications beyond `max` stay queued for the next call.
    pub fn drain_notifications_encoded_up_to(&mut self, max: usize) -> Vec<f64> {
        let queued = self.scheduler.observer_mut();
        let n = max.min(queued.len());
        queued
            .drain(..n)
            .flat_map(|notification| notification.encode())
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════
    // Meters
    // ═══════════════════════════════════════════════════════════════

    /// Output level at the current clock time, for meters.
    pub fn level(&self) -> f64 {
        self.scheduler.level()
    }
}

impl Default for HostSession {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}
