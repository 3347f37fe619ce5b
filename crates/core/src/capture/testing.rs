//! In-memory driver used by the unit tests.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{DriverConnection, IgnoreFilter, MessageQueue, MidiDriver};
use crate::{MidiSyncError, Result};

#[derive(Debug, Default)]
struct Script {
    ports: Vec<String>,
    sink: Option<MessageQueue>,
    open_connections: usize,
    fail_next_connect: bool,
    last_ignore: Option<IgnoreFilter>,
}

/// Driver whose ports and incoming traffic are scripted by the test. Clones
/// share state, so a clone can play the driver callback thread.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    pub(crate) fn with_ports(ports: &[&str]) -> Self {
        let driver = Self::default();
        driver.set_ports(ports);
        driver
    }

    pub(crate) fn set_ports(&self, ports: &[&str]) {
        self.script.lock().ports = ports.iter().map(|p| p.to_string()).collect();
    }

    pub(crate) fn fail_next_connect(&self) {
        self.script.lock().fail_next_connect = true;
    }

    /// Delivers bytes the way the realtime callback would.
    pub(crate) fn emit(&self, bytes: &[u8], timestamp: f64) {
        let sink = self.script.lock().sink.clone();
        if let Some(sink) = sink {
            sink.push_bytes(bytes, timestamp);
        }
    }

    pub(crate) fn open_connections(&self) -> usize {
        self.script.lock().open_connections
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.script.lock().sink.is_some()
    }

    pub(crate) fn last_ignore(&self) -> Option<IgnoreFilter> {
        self.script.lock().last_ignore
    }

    fn attach(
        &self,
        ignore: IgnoreFilter,
        sink: MessageQueue,
    ) -> Result<Box<dyn DriverConnection>> {
        let mut script = self.script.lock();
        if std::mem::take(&mut script.fail_next_connect) {
            return Err(MidiSyncError::Driver("scripted connect failure".into()));
        }
        script.sink = Some(sink);
        script.open_connections += 1;
        script.last_ignore = Some(ignore);
        Ok(Box::new(ScriptedConnection {
            script: Arc::clone(&self.script),
        }))
    }
}

impl MidiDriver for ScriptedDriver {
    fn enumerate(&self) -> Result<Vec<String>> {
        Ok(self.script.lock().ports.clone())
    }

    fn connect(
        &mut self,
        _port_index: usize,
        ignore: IgnoreFilter,
        sink: MessageQueue,
    ) -> Result<Box<dyn DriverConnection>> {
        self.attach(ignore, sink)
    }

    fn connect_virtual(
        &mut self,
        _name: &str,
        ignore: IgnoreFilter,
        sink: MessageQueue,
    ) -> Result<Box<dyn DriverConnection>> {
        self.attach(ignore, sink)
    }
}

struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
}

impl DriverConnection for ScriptedConnection {
    fn close(self: Box<Self>) {
        let mut script = self.script.lock();
        script.sink = None;
        script.open_connections = script.open_connections.saturating_sub(1);
    }
}
