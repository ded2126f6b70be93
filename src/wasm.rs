//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { ringout_init, RingoutSession } from './ringout.js';
//!
//! await init();
//! ringout_init();
//!
//! const session = new RingoutSession();
//! session.set_time(ctx.currentTime);
//! session.note_on(ctx.currentTime + 0.05, 440, "piano", 0.8);
//!
//! let polling = session.commit();
//! const frame = () => {
//!     replay(session.drain_commands());      // 6 numbers per command
//!     handle(session.drain_notifications()); // [code, time] pairs
//!     if (polling) {
//!         session.set_time(ctx.currentTime);
//!         polling = session.update();
//!         requestAnimationFrame(frame);
//!     }
//! };
//! requestAnimationFrame(frame);
//! ```

use wasm_bindgen::prelude::*;

use crate::config::{DEFAULT_SAMPLE_RATE, HostConfig, Timing};
use crate::host::HostSession;
use crate::scheduler::Wake;

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn ringout_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration for creating a session.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct RingoutConfig {
    /// Sample rate in Hz, used by `set_frame`.
    pub sample_rate: f64,
    /// Lead time before a mute may take effect, in seconds.
    pub safety_margin: f64,
    /// Natural decay length of every note, in seconds.
    pub natural_release: f64,
}

#[wasm_bindgen]
impl RingoutConfig {
    /// Create a new configuration with default values.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with custom values.
    pub fn with_values(sample_rate: f64, safety_margin: f64, natural_release: f64) -> Self {
        Self {
            sample_rate,
            safety_margin,
            natural_release,
        }
    }
}

impl Default for RingoutConfig {
    fn default() -> Self {
        let timing = Timing::default();
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            safety_margin: timing.safety_margin,
            natural_release: timing.natural_release,
        }
    }
}

impl From<RingoutConfig> for HostConfig {
    fn from(c: RingoutConfig) -> Self {
        Self {
            sample_rate: c.sample_rate,
            timing: Timing::default()
                .with_safety_margin(c.safety_margin)
                .with_natural_release(c.natural_release),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════════

/// Scheduler session driven by the page's `AudioContext`.
#[wasm_bindgen]
pub struct RingoutSession {
    inner: HostSession,
}

#[wasm_bindgen]
impl RingoutSession {
    /// Create a new session with default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> RingoutSession {
        Self::new_with_config(RingoutConfig::default())
    }

    /// Create a new session with custom configuration.
    pub fn new_with_config(config: RingoutConfig) -> RingoutSession {
        RingoutSession {
            inner: HostSession::new(config.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clock
    // ─────────────────────────────────────────────────────────────────────────

    /// Report `AudioContext.currentTime`.
    pub fn set_time(&mut self, seconds: f64) {
        self.inner.set_time(seconds);
    }

    /// Report the clock as a frame count, e.g. from an AudioWorklet.
    pub fn set_frame(&mut self, frame: f64) {
        self.inner.set_frame(frame.max(0.0) as u64);
    }

    pub fn now(&self) -> f64 {
        self.inner.now()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Batch
    // ─────────────────────────────────────────────────────────────────────────

    pub fn mute(&mut self, t: f64) {
        self.inner.mute(t);
    }

    pub fn cancel(&mut self, t: f64) {
        self.inner.cancel(t);
    }

    /// Queue a note-on. `kind` is `"piano"`, `"guitar"` or `"pad"`.
    pub fn note_on(
        &mut self,
        t: f64,
        frequency: f64,
        kind: &str,
        velocity: f64,
    ) -> Result<(), JsError> {
        self.inner
            .note_on_named(t, frequency, kind, velocity)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    pub fn note_off(&mut self, t: f64, frequency: f64) {
        self.inner.note_off(t, frequency);
    }

    pub fn alarm(&mut self, t: f64) {
        self.inner.alarm(t);
    }

    /// Apply the queued batch. Returns whether `update` must be polled.
    pub fn commit(&mut self) -> bool {
        !self.inner.commit().is_idle()
    }

    /// Run one sweep. Returns whether polling must continue.
    pub fn update(&mut self) -> bool {
        !self.inner.update().is_idle()
    }

    /// Earliest time anything changes, or `-1` when idle.
    pub fn next_deadline(&self) -> f64 {
        match self.inner.wake() {
            Wake::Poll { next_deadline } => next_deadline,
            Wake::Idle => -1.0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Readback
    // ─────────────────────────────────────────────────────────────────────────

    /// Graph commands since the last call, six numbers each.
    pub fn drain_commands(&mut self) -> Vec<f64> {
        self.inner.drain_commands_encoded()
    }

    /// Notifications since the last call, as `[code, time]` pairs.
    pub fn drain_notifications(&mut self) -> Vec<f64> {
        self.inner.drain_notifications_encoded()
    }

    pub fn active_notes(&self) -> u32 {
        self.inner.active_notes() as u32
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Output level at the current clock time, for meters.
    pub fn level(&self) -> f64 {
        self.inner.level()
    }
}

impl Default for RingoutSession {
    fn default() -> Self {
        Self::new()
    }
}
