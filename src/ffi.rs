// C-compatible FFI bindings for Swift/iOS integration.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - String parameters must be valid UTF-8 (Swift strings are always valid)
// - Caller must call `session_destroy` for each `session_create`

use std::ffi::{CStr, c_char};

use crate::backend::ENCODED_COMMAND_WORDS;
use crate::config::{DEFAULT_SAMPLE_RATE, HostConfig, Timing};
use crate::host::HostSession;
use crate::scheduler::Wake;

use log::{LevelFilter, debug, warn};
use oslog::OsLogger;

// Logger subsystem identifier
const LOG_SUBSYSTEM: &str = "com.ringout.engine";

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup. Output shows up in Console.app and
/// Xcode's debug console.
#[unsafe(no_mangle)]
pub extern "C" fn ringout_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to a HostSession.
pub struct RingoutSession {
    inner: HostSession,
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Value Types
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration for creating a session.
#[repr(C)]
pub struct RingoutConfig {
    /// Sample rate in Hz (e.g., 44100.0, 48000.0).
    pub sample_rate: f64,
    /// Lead time before a mute may take effect, in seconds.
    pub safety_margin: f64,
    /// Natural decay length of every note, in seconds.
    pub natural_release: f64,
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

impl From<&RingoutConfig> for HostConfig {
    fn from(c: &RingoutConfig) -> Self {
        Self {
            sample_rate: c.sample_rate,
            timing: Timing::default()
                .with_safety_margin(c.safety_margin)
                .with_natural_release(c.natural_release),
        }
    }
}

/// Polling decision returned by `session_commit` and `session_update`.
#[repr(C)]
pub struct RingoutWake {
    /// Whether `session_update` must be called again.
    pub poll: bool,
    /// Earliest time anything changes. Meaningless when `poll` is false.
    pub next_deadline: f64,
}

impl From<Wake> for RingoutWake {
    fn from(w: Wake) -> Self {
        match w {
            Wake::Idle => Self {
                poll: false,
                next_deadline: 0.0,
            },
            Wake::Poll { next_deadline } => Self {
                poll: true,
                next_deadline,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Session Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

/// Get the default configuration values.
#[unsafe(no_mangle)]
pub extern "C" fn ringout_default_config() -> RingoutConfig {
    RingoutConfig::default()
}

/// Create a session with default configuration.
///
/// Returns an opaque pointer that must be freed with `session_destroy`.
#[unsafe(no_mangle)]
pub extern "C" fn session_create() -> *mut RingoutSession {
    unsafe { session_create_with_config(std::ptr::null()) }
}

/// Create a session with custom configuration.
///
/// # Safety
/// `config` must be a valid pointer to a RingoutConfig struct or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_create_with_config(
    config: *const RingoutConfig,
) -> *mut RingoutSession {
    let host_config = if config.is_null() {
        HostConfig::default()
    } else {
        unsafe { HostConfig::from(&*config) }
    };

    debug!(
        "Creating session: sample_rate={}, safety_margin={}",
        host_config.sample_rate, host_config.timing.safety_margin
    );

    Box::into_raw(Box::new(RingoutSession {
        inner: HostSession::new(host_config),
    }))
}

/// Destroy a session.
///
/// # Safety
/// `session` must be a valid pointer returned by `session_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_destroy(session: *mut RingoutSession) {
    if !session.is_null() {
        unsafe { drop(Box::from_raw(session)) };
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Clock
// ═══════════════════════════════════════════════════════════════════════════

/// Report the host clock in seconds.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_set_time(session: *mut RingoutSession, seconds: f64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.set_time(seconds) };
}

/// Report the host clock as a rendered frame count.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_set_frame(session: *mut RingoutSession, frame: u64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.set_frame(frame) };
}

// ═══════════════════════════════════════════════════════════════════════════
// Batch
// ═══════════════════════════════════════════════════════════════════════════

#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_mute(session: *mut RingoutSession, t: f64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.mute(t) };
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_cancel(session: *mut RingoutSession, t: f64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.cancel(t) };
}

/// Queue a note-on using a numeric voice kind code.
///
/// Returns `false` if the code is unknown.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_note_on(
    session: *mut RingoutSession,
    t: f64,
    frequency: f64,
    kind: u32,
    velocity: f64,
) -> bool {
    if session.is_null() {
        return false;
    }
    match unsafe { (*session).inner.note_on_code(t, frequency, kind, velocity) } {
        Ok(()) => true,
        Err(e) => {
            warn!("{}", e);
            false
        }
    }
}

/// Queue a note-on naming the voice kind.
///
/// # Safety
/// `kind` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_note_on_named(
    session: *mut RingoutSession,
    t: f64,
    frequency: f64,
    kind: *const c_char,
    velocity: f64,
) -> bool {
    if session.is_null() || kind.is_null() {
        return false;
    }
    let Ok(kind) = (unsafe { CStr::from_ptr(kind) }).to_str() else {
        warn!("Voice kind is not valid UTF-8");
        return false;
    };
    match unsafe { (*session).inner.note_on_named(t, frequency, kind, velocity) } {
        Ok(()) => true,
        Err(e) => {
            warn!("{}", e);
            false
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_note_off(session: *mut RingoutSession, t: f64, frequency: f64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.note_off(t, frequency) };
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_alarm(session: *mut RingoutSession, t: f64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.alarm(t) };
}

/// Apply the queued batch.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_commit(session: *mut RingoutSession) -> RingoutWake {
    if session.is_null() {
        return Wake::Idle.into();
    }
    unsafe { (*session).inner.commit().into() }
}

/// Run one maintenance sweep.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_update(session: *mut RingoutSession) -> RingoutWake {
    if session.is_null() {
        return Wake::Idle.into();
    }
    unsafe { (*session).inner.update().into() }
}

// ═══════════════════════════════════════════════════════════════════════════
// Readback
// ═══════════════════════════════════════════════════════════════════════════

/// Number of `f64` words per encoded graph command.
#[unsafe(no_mangle)]
pub extern "C" fn ringout_command_words() -> u32 {
    ENCODED_COMMAND_WORDS as u32
}

/// Number of graph commands waiting to be drained.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_pending_commands(session: *const RingoutSession) -> u32 {
    if session.is_null() {
        return 0;
    }
    unsafe { (*session).inner.pending_commands() as u32 }
}

/// Number of notifications waiting to be drained.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_pending_notifications(session: *const RingoutSession) -> u32 {
    if session.is_null() {
        return 0;
    }
    unsafe { (*session).inner.pending_notifications() as u32 }
}

/// Copy pending graph commands into `out`.
///
/// Writes whole commands only, as many as fit in `capacity` words. Commands
/// that do not fit stay queued for the next call; size `out` with
/// `session_pending_commands`. Returns the number of commands written.
///
/// # Safety
/// `out` must point to at least `capacity` writable `f64`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_drain_commands(
    session: *mut RingoutSession,
    out: *mut f64,
    capacity: u32,
) -> u32 {
    if session.is_null() || out.is_null() {
        return 0;
    }
    let max = capacity as usize / ENCODED_COMMAND_WORDS;
    let encoded = unsafe { (*session).inner.drain_commands_encoded_up_to(max) };
    unsafe { std::ptr::copy_nonoverlapping(encoded.as_ptr(), out, encoded.len()) };
    (encoded.len() / ENCODED_COMMAND_WORDS) as u32
}

/// Copy pending notifications into `out` as `[code, time]` pairs.
///
/// Notifications that do not fit stay queued for the next call. Returns the
/// number of notifications written.
///
/// # Safety
/// `out` must point to at least `capacity` writable `f64`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_drain_notifications(
    session: *mut RingoutSession,
    out: *mut f64,
    capacity: u32,
) -> u32 {
    if session.is_null() || out.is_null() {
        return 0;
    }
    let max = capacity as usize / 2;
    let encoded = unsafe { (*session).inner.drain_notifications_encoded_up_to(max) };
    unsafe { std::ptr::copy_nonoverlapping(encoded.as_ptr(), out, encoded.len()) };
    (encoded.len() / 2) as u32
}

/// Output level at the current clock time, for meters.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_level(session: *const RingoutSession) -> f64 {
    if session.is_null() {
        return 0.0;
    }
    unsafe { (*session).inner.level() }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_active_notes(session: *const RingoutSession) -> u32 {
    if session.is_null() {
        return 0;
    }
    unsafe { (*session).inner.active_notes() as u32 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_is_running(session: *const RingoutSession) -> bool {
    if session.is_null() {
        return false;
    }
    unsafe { (*session).inner.is_running() }
}
