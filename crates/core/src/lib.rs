//! MIDI input and clock synchronisation for the Music Visualiser.
//!
//! An external controller drives beat-locked pulses, note-triggered effects
//! and controller modulation through this crate. Raw messages arrive through
//! a capture backend (native driver callback or the host's per-frame event
//! delivery), are decoded, advance the clock tracker and are fanned out to
//! listeners from the main loop.

pub mod capture;
pub mod clock;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod mapping;
pub mod system;

pub use capture::{
    BackendKind, CaptureBackend, FallbackBackend, HostMidiEvent, HostMidiFeed, IgnoreFilter,
    NativeBackend, PortDescriptor,
};
pub use clock::{ClockState, ClockTracker, TICKS_PER_BEAT};
pub use config::{AppConfig, MidiConfig};
pub use decode::{decode, decode_message, DecodedMessage, MidiEvent, RawMessage};
pub use dispatch::{EventDispatcher, ListenerId, MidiListener, Notification};
pub use error::{MidiSyncError, Result};
pub use mapping::{MappingDescriptor, MappingMatrix, ParameterUpdate};
pub use system::{select_backend, MidiSync};
