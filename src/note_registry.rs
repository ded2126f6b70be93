// src/note_registry.rs

use crate::clock::Time;
use crate::config::Timing;
use crate::note::Note;

/// Notes that may still be audible.
///
/// Kept sorted by descending expiration after every batch, so the note that
/// falls silent first is always at the tail and eviction never scans.
#[derive(Debug, Default)]
pub struct NoteRegistry {
    notes: Vec<Note>,
}

impl NoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    /// Track a new note. Order is restored by the next [`sort`](Self::sort).
    pub fn push(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Restore descending-expiration order.
    pub fn sort(&mut self) {
        self.notes
            .sort_by(|a, b| b.expiration().total_cmp(&a.expiration()));
    }

    /// Release every note at the tail whose expiration has passed.
    ///
    /// Stops at the first note still sounding. Returns how many were released.
    pub fn sweep(&mut self, now: Time) -> usize {
        let mut released = 0;
        while self.notes.last().is_some_and(|n| n.is_expired(now)) {
            if let Some(note) = self.notes.pop() {
                note.release();
                released += 1;
            }
        }
        released
    }

    /// The earliest expiration, if any note is tracked.
    #[inline]
    pub fn next_expiration(&self) -> Option<Time> {
        self.notes.last().map(Note::expiration)
    }

    /// Loudest note at `t`, after each note's fader.
    pub fn level_at(&self, t: Time) -> f64 {
        self.notes
            .iter()
            .map(|n| n.level_at(t) * n.fader_at(t))
            .fold(0.0, f64::max)
    }

    /// Mute every note.
    pub fn mute_all(&mut self, t: Time, now: Time, timing: &Timing) {
        for note in &mut self.notes {
            note.mute_at(t, now, timing);
        }
    }

    /// Mute every note sounding exactly `frequency`.
    pub fn mute_frequency(&mut self, t: Time, frequency: f64, now: Time, timing: &Timing) {
        for note in self.notes.iter_mut().filter(|n| n.frequency() == frequency) {
            note.mute_at(t, now, timing);
        }
    }

    /// Cancel pending mutes on every note.
    pub fn cancel_all(&mut self, t: Time, now: Time, timing: &Timing) {
        for note in &mut self.notes {
            note.cancel_at(t, now, timing);
        }
    }

    /// Whether expirations are in descending order.
    pub fn is_sorted(&self) -> bool {
        self.notes
            .windows(2)
            .all(|pair| pair[0].expiration() >= pair[1].expiration())
    }
}
