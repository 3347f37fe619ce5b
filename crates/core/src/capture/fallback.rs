use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{BackendKind, CaptureBackend, IgnoreFilter, MessageQueue, Polled, PortDescriptor};
use crate::{MidiSyncError, RawMessage, Result};

/// Discrete MIDI event as the host delivers it during frame processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostMidiEvent {
    /// Channel message nibble (`0x9` for note on, ...), or the full status
    /// byte for system messages (`0xF8` for timing clock, ...).
    pub message: u8,
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
}

impl HostMidiEvent {
    pub fn new(message: u8, channel: u8, data1: u8, data2: u8) -> Self {
        Self {
            message,
            channel,
            data1,
            data2,
        }
    }

    /// Rebuilds the wire status byte.
    pub fn status(&self) -> u8 {
        if self.message >= 0xF0 {
            self.message
        } else {
            ((self.message & 0x0F) << 4) | (self.channel & 0x0F)
        }
    }
}

#[derive(Debug)]
struct FeedState {
    inputs: Vec<String>,
    listening: bool,
}

/// Host side of the fallback backend. The host keeps a clone, reports the
/// connected devices and forwards every MIDI event it receives.
#[derive(Debug, Clone)]
pub struct HostMidiFeed {
    state: Arc<Mutex<FeedState>>,
    queue: MessageQueue,
    epoch: Instant,
}

impl HostMidiFeed {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState {
                inputs: Vec::new(),
                listening: false,
            })),
            queue: MessageQueue::with_capacity(queue_capacity),
            epoch: Instant::now(),
        }
    }

    pub fn set_connected_inputs<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().inputs = names.into_iter().map(Into::into).collect();
    }

    pub fn connected_inputs(&self) -> Vec<String> {
        self.state.lock().inputs.clone()
    }

    /// Forwards an event stamped with the feed's wall clock.
    pub fn deliver(&self, event: HostMidiEvent) {
        self.deliver_at(event, self.epoch.elapsed().as_secs_f64());
    }

    /// Forwards an event with an explicit timestamp in seconds.
    pub fn deliver_at(&self, event: HostMidiEvent, timestamp: f64) {
        // Held across the push: close clears `listening` before the queue.
        let state = self.state.lock();
        if !state.listening {
            return;
        }
        self.queue.push(RawMessage::new(
            event.status(),
            event.data1,
            event.data2,
            timestamp,
        ));
    }

    fn set_listening(&self, listening: bool) {
        self.state.lock().listening = listening;
    }
}

/// Lower precision backend driven by the host's per-frame event delivery.
///
/// Once opened it accepts events from every connected device; the selected
/// index is kept for display only.
#[derive(Debug)]
pub struct FallbackBackend {
    feed: HostMidiFeed,
    scratch: VecDeque<RawMessage>,
    selected: Option<i32>,
}

impl FallbackBackend {
    pub fn new(feed: HostMidiFeed) -> Self {
        Self {
            feed,
            scratch: VecDeque::new(),
            selected: None,
        }
    }

    pub fn feed(&self) -> &HostMidiFeed {
        &self.feed
    }
}

impl CaptureBackend for FallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn list_ports(&self) -> Vec<PortDescriptor> {
        PortDescriptor::enumerate(self.feed.connected_inputs())
    }

    fn open(&mut self, port_index: i32) -> Result<()> {
        self.close()?;

        let count = self.feed.connected_inputs().len();
        if port_index < 0 || port_index as usize >= count {
            return Err(MidiSyncError::InvalidPort {
                index: port_index,
                count,
            });
        }

        self.selected = Some(port_index);
        self.feed.set_listening(true);
        info!(
            port = port_index,
            "listening to all host MIDI inputs (fallback backend)"
        );
        Ok(())
    }

    fn open_virtual(&mut self, _name: &str) -> Result<()> {
        Err(MidiSyncError::Unsupported(
            "virtual input ports on the fallback backend",
        ))
    }

    fn close(&mut self) -> Result<()> {
        if self.selected.take().is_some() {
            debug!("stopped listening to host MIDI inputs");
        }
        self.feed.set_listening(false);
        self.feed.queue.clear();
        self.scratch.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.selected.is_some()
    }

    fn selected_port(&self) -> Option<i32> {
        self.selected
    }

    fn poll(&mut self) -> Polled<'_> {
        self.feed.queue.drain_into(&mut self.scratch);
        self.scratch.drain(..)
    }

    fn pending(&self) -> usize {
        self.feed.queue.len()
    }

    fn dropped(&self) -> u64 {
        self.feed.queue.dropped()
    }

    fn set_ignore(&mut self, _filter: IgnoreFilter) {
        // The host never forwards SysEx or active sensing.
    }
}
