// src/instrument.rs
//
// Instruments turn a note-on into a started, routed `Note`.

use std::collections::HashMap;
use std::str::FromStr;

use crate::backend::{AudioBackend, Waveform};
use crate::clock::Time;
use crate::config::Timing;
use crate::error::{ScheduleError, ScheduleResult};
use crate::note::Note;
use crate::voice::Voice;

// ═══════════════════════════════════════════════════════════════════
// Voice kinds
// ═══════════════════════════════════════════════════════════════════

/// Numeric voice kind codes used across FFI.
pub mod voice_codes {
    pub const PIANO: u32 = 0;
    pub const GUITAR: u32 = 1;
    pub const PAD: u32 = 2;
}

/// Which instrument a note-on asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceKind {
    Piano,
    Guitar,
    Pad,
}

impl VoiceKind {
    pub const ALL: [VoiceKind; 3] = [VoiceKind::Piano, VoiceKind::Guitar, VoiceKind::Pad];

    pub fn code(self) -> u32 {
        match self {
            VoiceKind::Piano => voice_codes::PIANO,
            VoiceKind::Guitar => voice_codes::GUITAR,
            VoiceKind::Pad => voice_codes::PAD,
        }
    }

    pub fn from_code(code: u32) -> ScheduleResult<Self> {
        match code {
            voice_codes::PIANO => Ok(VoiceKind::Piano),
            voice_codes::GUITAR => Ok(VoiceKind::Guitar),
            voice_codes::PAD => Ok(VoiceKind::Pad),
            other => Err(ScheduleError::UnknownVoiceCode(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VoiceKind::Piano => "piano",
            VoiceKind::Guitar => "guitar",
            VoiceKind::Pad => "pad",
        }
    }
}

impl FromStr for VoiceKind {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoiceKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScheduleError::UnknownVoiceKind(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Instruments
// ═══════════════════════════════════════════════════════════════════

/// Builds notes for one voice kind.
pub trait Instrument {
    fn kind(&self) -> VoiceKind;

    /// Create a note sounding `frequency` from `t`, already started and
    /// routed to the output bus.
    fn play(
        &self,
        backend: &mut dyn AudioBackend,
        timing: &Timing,
        velocity: f64,
        t: Time,
        frequency: f64,
    ) -> Note;
}

/// One oscillator of a preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    /// Multiple of the note frequency.
    pub ratio: f64,
    pub waveform: Waveform,
    /// Peak level relative to velocity.
    pub gain: f64,
}

impl Partial {
    pub const fn new(ratio: f64, waveform: Waveform, gain: f64) -> Self {
        Self {
            ratio,
            waveform,
            gain,
        }
    }
}

/// Instrument made of a fixed stack of partials.
#[derive(Debug, Clone)]
pub struct PartialPreset {
    kind: VoiceKind,
    partials: Vec<Partial>,
}

impl PartialPreset {
    pub fn new(kind: VoiceKind) -> Self {
        Self {
            kind,
            partials: Vec::new(),
        }
    }

    pub fn with_partial(mut self, partial: Partial) -> Self {
        self.partials.push(partial);
        self
    }

    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }
}

impl Instrument for PartialPreset {
    fn kind(&self) -> VoiceKind {
        self.kind
    }

    fn play(
        &self,
        backend: &mut dyn AudioBackend,
        timing: &Timing,
        velocity: f64,
        t: Time,
        frequency: f64,
    ) -> Note {
        let route = backend.route();
        let mut expiration = t + timing.natural_release;

        let voices = self
            .partials
            .iter()
            .map(|partial| {
                let mut voice = Voice::new(backend.tone(partial.waveform, route.id()), timing);
                voice.start();
                let end = voice.note_at(t, frequency * partial.ratio, velocity * partial.gain);
                expiration = expiration.max(end);
                voice
            })
            .collect();

        Note::new(frequency, t, expiration, voices, route)
    }
}

pub fn piano() -> PartialPreset {
    PartialPreset::new(VoiceKind::Piano)
        .with_partial(Partial::new(1.0, Waveform::Triangle, 0.5))
        .with_partial(Partial::new(2.0, Waveform::Sine, 0.15))
}

pub fn guitar() -> PartialPreset {
    PartialPreset::new(VoiceKind::Guitar).with_partial(Partial::new(1.0, Waveform::Sawtooth, 0.5))
}

pub fn pad() -> PartialPreset {
    PartialPreset::new(VoiceKind::Pad)
        .with_partial(Partial::new(1.0, Waveform::Sine, 0.35))
        .with_partial(Partial::new(0.5, Waveform::Square, 0.1))
        .with_partial(Partial::new(1.5, Waveform::Sine, 0.1))
}

// ═══════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════

/// Instruments by voice kind.
#[derive(Default)]
pub struct InstrumentRegistry {
    instruments: HashMap<VoiceKind, Box<dyn Instrument>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every standard preset.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        register_standard_instruments(&mut registry);
        registry
    }

    /// Register an instrument, replacing any previous one of the same kind.
    pub fn register(&mut self, instrument: Box<dyn Instrument>) {
        self.instruments.insert(instrument.kind(), instrument);
    }

    pub fn get(&self, kind: VoiceKind) -> ScheduleResult<&dyn Instrument> {
        self.instruments
            .get(&kind)
            .map(|i| i.as_ref())
            .ok_or(ScheduleError::UnregisteredInstrument(kind))
    }

    pub fn contains(&self, kind: VoiceKind) -> bool {
        self.instruments.contains_key(&kind)
    }
}

/// Populate the registry with all standard presets.
pub fn register_standard_instruments(registry: &mut InstrumentRegistry) {
    registry.register(Box::new(piano()));
    registry.register(Box::new(guitar()));
    registry.register(Box::new(pad()));
}
