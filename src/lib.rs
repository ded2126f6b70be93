// src/lib.rs
//
// Library entry point for Rust, wasm and FFI consumers.

pub mod alarm_registry;
pub mod automation;
pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod instrument;
pub mod note;
pub mod note_registry;
pub mod observer;
pub mod scheduler;
pub mod voice;

#[cfg(feature = "ios")]
pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;

// Re-export key types for Rust consumers
pub use automation::{AutomatableParam, Automation, AutomationEnvelope, AutomationOp};
pub use backend::{AudioBackend, CommandBackend, GraphCommand, NodeId, SilentBackend, Waveform};
pub use clock::{Clock, ManualClock, SampleClock, Time};
pub use config::{HostConfig, Timing};
pub use error::{ScheduleError, ScheduleResult};
pub use event::{AudioChange, Notification};
pub use host::HostSession;
pub use instrument::{Instrument, InstrumentRegistry, VoiceKind, register_standard_instruments};
pub use note::{MuteState, Note};
pub use observer::Observer;
pub use scheduler::{Scheduler, SchedulerState, Wake};
pub use voice::Voice;
