//! Capture backends.
//!
//! Both backends expose the same [`CaptureBackend`] contract so that the rest
//! of the crate never needs to know which one is active. The native backend
//! receives messages on a driver thread; the fallback backend receives them
//! from the host's frame loop through a [`HostMidiFeed`].

mod fallback;
mod native;
mod queue;

#[cfg(feature = "native")]
mod midir_driver;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::vec_deque;

use serde::{Deserialize, Serialize};

use crate::{RawMessage, Result};

pub use fallback::{FallbackBackend, HostMidiEvent, HostMidiFeed};
pub use native::{DriverConnection, MidiDriver, NativeBackend};
pub use queue::MessageQueue;

#[cfg(feature = "native")]
pub use midir_driver::MidirDriver;

/// Messages drained by a single [`CaptureBackend::poll`] call.
pub type Polled<'a> = vec_deque::Drain<'a, RawMessage>;

/// Input port as reported by the most recent enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub index: i32,
    pub display_name: String,
}

impl PortDescriptor {
    pub(crate) fn enumerate(names: Vec<String>) -> Vec<Self> {
        names
            .into_iter()
            .enumerate()
            .map(|(index, display_name)| Self {
                index: index as i32,
                display_name,
            })
            .collect()
    }
}

/// Which backend ended up being selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Native,
    Fallback,
}

/// Message classes the driver should discard before they reach the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreFilter {
    pub sysex: bool,
    pub timing: bool,
    pub active_sense: bool,
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        // Timing must pass, the clock tracker lives on it.
        Self {
            sysex: true,
            timing: false,
            active_sense: true,
        }
    }
}

/// Uniform port management and polling contract.
pub trait CaptureBackend {
    fn kind(&self) -> BackendKind;

    /// Re-enumerates every call; indices are only valid until the next call.
    fn list_ports(&self) -> Vec<PortDescriptor>;

    /// Closes any open port first, then opens `port_index`.
    fn open(&mut self, port_index: i32) -> Result<()>;

    /// Opens a virtual input other applications can connect to.
    fn open_virtual(&mut self, name: &str) -> Result<()>;

    /// Idempotent. Empties the queue.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Index passed to the last successful [`open`](Self::open).
    fn selected_port(&self) -> Option<i32>;

    /// Drains whatever is queued right now. Never blocks.
    fn poll(&mut self) -> Polled<'_>;

    /// Number of messages waiting for the next poll.
    fn pending(&self) -> usize;

    /// Messages lost to queue overflow since the port was opened.
    fn dropped(&self) -> u64;

    /// Filter applied to the next port opened.
    fn set_ignore(&mut self, filter: IgnoreFilter);
}
