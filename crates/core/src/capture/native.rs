use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::{BackendKind, CaptureBackend, IgnoreFilter, MessageQueue, Polled, PortDescriptor};
use crate::{MidiSyncError, RawMessage, Result};

/// Live connection returned by a [`MidiDriver`]. Closing it must unregister
/// the driver callback before returning.
pub trait DriverConnection: Send {
    fn close(self: Box<Self>);
}

/// Minimal surface of a platform MIDI input driver.
///
/// `connect` hands the driver a [`MessageQueue`] producer; the driver's
/// callback thread pushes into it and must not block or log.
pub trait MidiDriver: Send {
    fn enumerate(&self) -> Result<Vec<String>>;

    fn connect(
        &mut self,
        port_index: usize,
        ignore: IgnoreFilter,
        sink: MessageQueue,
    ) -> Result<Box<dyn DriverConnection>>;

    fn connect_virtual(
        &mut self,
        _name: &str,
        _ignore: IgnoreFilter,
        _sink: MessageQueue,
    ) -> Result<Box<dyn DriverConnection>> {
        Err(MidiSyncError::Unsupported("virtual input ports"))
    }
}

/// High precision backend fed from the driver's realtime callback.
pub struct NativeBackend<D: MidiDriver> {
    driver: D,
    queue: MessageQueue,
    scratch: VecDeque<RawMessage>,
    connection: Option<Box<dyn DriverConnection>>,
    selected: Option<i32>,
    ignore: IgnoreFilter,
}

impl<D: MidiDriver> NativeBackend<D> {
    pub fn new(driver: D, queue_capacity: usize) -> Self {
        Self {
            driver,
            queue: MessageQueue::with_capacity(queue_capacity),
            scratch: VecDeque::with_capacity(queue_capacity),
            connection: None,
            selected: None,
            ignore: IgnoreFilter::default(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn ignore(&self) -> IgnoreFilter {
        self.ignore
    }

    fn port_count(&self) -> Result<usize> {
        Ok(self.driver.enumerate()?.len())
    }
}

impl<D: MidiDriver> CaptureBackend for NativeBackend<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn list_ports(&self) -> Vec<PortDescriptor> {
        match self.driver.enumerate() {
            Ok(names) => PortDescriptor::enumerate(names),
            Err(err) => {
                warn!(%err, "failed to enumerate MIDI inputs");
                Vec::new()
            }
        }
    }

    fn open(&mut self, port_index: i32) -> Result<()> {
        self.close()?;

        let count = self.port_count()?;
        let index = usize::try_from(port_index)
            .ok()
            .filter(|index| *index < count)
            .ok_or(MidiSyncError::InvalidPort {
                index: port_index,
                count,
            })?;

        let connection = self
            .driver
            .connect(index, self.ignore, self.queue.clone())?;
        self.connection = Some(connection);
        self.selected = Some(port_index);
        info!(port = port_index, "opened native MIDI input");
        Ok(())
    }

    fn open_virtual(&mut self, name: &str) -> Result<()> {
        self.close()?;
        let connection = self
            .driver
            .connect_virtual(name, self.ignore, self.queue.clone())?;
        self.connection = Some(connection);
        info!(name, "opened virtual MIDI input");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            connection.close();
            debug!(port = ?self.selected, "closed native MIDI input");
        }
        self.selected = None;
        self.queue.clear();
        self.scratch.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn selected_port(&self) -> Option<i32> {
        self.selected
    }

    fn poll(&mut self) -> Polled<'_> {
        self.queue.drain_into(&mut self.scratch);
        self.scratch.drain(..)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    fn set_ignore(&mut self, filter: IgnoreFilter) {
        self.ignore = filter;
    }
}

impl<D: MidiDriver> Drop for NativeBackend<D> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl<D: MidiDriver> std::fmt::Debug for NativeBackend<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend")
            .field("open", &self.connection.is_some())
            .field("selected", &self.selected)
            .field("pending", &self.queue.len())
            .finish()
    }
}
