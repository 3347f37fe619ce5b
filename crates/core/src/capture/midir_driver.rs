use midir::{Ignore, MidiInput, MidiInputConnection};

use super::{DriverConnection, IgnoreFilter, MessageQueue, MidiDriver};
use crate::{MidiSyncError, Result};

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// [`MidiDriver`] backed by `midir` (ALSA, CoreMIDI, WinMM).
#[derive(Debug, Clone)]
pub struct MidirDriver {
    client_name: String,
}

impl MidirDriver {
    /// Checks that the platform driver can be initialised at all.
    pub fn detect(client_name: &str) -> Result<Self> {
        MidiInput::new(client_name).map_err(|err| MidiSyncError::NoCapability(err.to_string()))?;
        Ok(Self {
            client_name: client_name.to_string(),
        })
    }

    fn input(&self, ignore: IgnoreFilter) -> Result<MidiInput> {
        let mut input = MidiInput::new(&self.client_name).map_err(MidiSyncError::driver)?;
        input.ignore(to_midir_ignore(ignore));
        Ok(input)
    }
}

impl MidiDriver for MidirDriver {
    fn enumerate(&self) -> Result<Vec<String>> {
        let input = MidiInput::new(&self.client_name).map_err(MidiSyncError::driver)?;
        let names = input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Port {index}"))
            })
            .collect();
        Ok(names)
    }

    fn connect(
        &mut self,
        port_index: usize,
        ignore: IgnoreFilter,
        sink: MessageQueue,
    ) -> Result<Box<dyn DriverConnection>> {
        let input = self.input(ignore)?;
        let ports = input.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| MidiSyncError::Driver(format!("port {port_index} vanished")))?;
        let connection = input
            .connect(
                port,
                &format!("{}-in", self.client_name),
                move |stamp, bytes, _| {
                    sink.push_bytes(bytes, stamp as f64 / MICROS_PER_SECOND);
                },
                (),
            )
            .map_err(MidiSyncError::driver)?;
        Ok(Box::new(MidirConnection(connection)))
    }

    #[cfg(unix)]
    fn connect_virtual(
        &mut self,
        name: &str,
        ignore: IgnoreFilter,
        sink: MessageQueue,
    ) -> Result<Box<dyn DriverConnection>> {
        use midir::os::unix::VirtualInput;

        let input = self.input(ignore)?;
        let connection = input
            .create_virtual(
                name,
                move |stamp, bytes, _| {
                    sink.push_bytes(bytes, stamp as f64 / MICROS_PER_SECOND);
                },
                (),
            )
            .map_err(MidiSyncError::driver)?;
        Ok(Box::new(MidirConnection(connection)))
    }
}

struct MidirConnection(MidiInputConnection<()>);

impl DriverConnection for MidirConnection {
    fn close(self: Box<Self>) {
        let _ = self.0.close();
    }
}

fn to_midir_ignore(filter: IgnoreFilter) -> Ignore {
    match (filter.sysex, filter.timing, filter.active_sense) {
        (false, false, false) => Ignore::None,
        (true, false, false) => Ignore::Sysex,
        (false, true, false) => Ignore::Time,
        (false, false, true) => Ignore::ActiveSense,
        (true, true, false) => Ignore::SysexAndTime,
        (true, false, true) => Ignore::SysexAndActiveSense,
        (false, true, true) => Ignore::TimeAndActiveSense,
        (true, true, true) => Ignore::All,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_keeps_timing() {
        assert!(matches!(
            to_midir_ignore(IgnoreFilter::default()),
            Ignore::SysexAndActiveSense
        ));
    }
}
