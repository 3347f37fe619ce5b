//! Backend selection and the per-frame MIDI pipeline.
//!
//! [`MidiSync`] owns the capture backend, the clock tracker and the event
//! dispatcher. The host calls [`MidiSync::update`] once per frame:
//!
//! ```ignore
//! let feed = HostMidiFeed::new(config.midi.queue_capacity);
//! let mut midi = MidiSync::new(&config.midi, feed.clone());
//! midi.dispatcher_mut().subscribe(|n: &Notification| println!("{n:?}"));
//! loop {
//!     midi.update();
//!     let phase = midi.beat_position().fract();
//! }
//! ```

use tracing::{debug, info, trace, warn};

use crate::capture::{
    BackendKind, CaptureBackend, FallbackBackend, HostMidiFeed, PortDescriptor,
};
use crate::{
    decode_message, ClockTracker, EventDispatcher, MidiConfig, MidiEvent, Notification, Result,
};

/// MIDI input, clock tracking and dispatch behind one handle.
pub struct MidiSync {
    backend: Box<dyn CaptureBackend>,
    clock: ClockTracker,
    dispatcher: EventDispatcher,
    reported_drops: u64,
}

impl MidiSync {
    /// Selects the backend once and applies the auto-connect policy.
    pub fn new(config: &MidiConfig, feed: HostMidiFeed) -> Self {
        let backend = select_backend(config, feed);
        Self::with_backend(config, backend)
    }

    /// Wraps an already constructed backend.
    pub fn with_backend(config: &MidiConfig, mut backend: Box<dyn CaptureBackend>) -> Self {
        backend.set_ignore(config.ignore);
        let mut sync = Self {
            backend,
            clock: ClockTracker::new(),
            dispatcher: EventDispatcher::new(),
            reported_drops: 0,
        };

        if config.auto_connect {
            let port = config.auto_connect_port;
            if let Err(err) = sync.open(port) {
                warn!(port, %err, "MIDI auto-connect failed");
            }
        }
        sync
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn list_ports(&self) -> Vec<PortDescriptor> {
        self.backend.list_ports()
    }

    pub fn port_names(&self) -> Vec<String> {
        self.list_ports()
            .into_iter()
            .map(|port| port.display_name)
            .collect()
    }

    /// Opens an input port. The clock starts fresh for the new connection.
    pub fn open(&mut self, port_index: i32) -> Result<()> {
        self.clock.reset();
        self.reported_drops = 0;
        self.backend.open(port_index)
    }

    pub fn open_virtual(&mut self, name: &str) -> Result<()> {
        self.clock.reset();
        self.reported_drops = 0;
        self.backend.open_virtual(name)
    }

    /// Safe to call at any time, including with nothing open.
    pub fn close(&mut self) -> Result<()> {
        self.backend.close()?;
        self.clock.reset();
        self.reported_drops = 0;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_open()
    }

    pub fn is_port_open(&self) -> bool {
        self.is_open()
    }

    pub fn selected_port(&self) -> Option<i32> {
        self.backend.selected_port()
    }

    /// Number of messages waiting for the next [`update`](Self::update).
    pub fn pending(&self) -> usize {
        self.backend.pending()
    }

    /// Drains the backend and delivers notifications for everything that
    /// arrived since the last call. Returns the number of decoded messages.
    pub fn update(&mut self) -> usize {
        let dropped = self.backend.dropped();
        if dropped > self.reported_drops {
            debug!(
                dropped = dropped - self.reported_drops,
                "MIDI queue overflow, oldest messages discarded"
            );
            self.reported_drops = dropped;
        }

        let mut decoded = 0;
        for raw in self.backend.poll() {
            let Some(message) = decode_message(&raw) else {
                trace!(status = raw.status, "skipping unsupported MIDI message");
                continue;
            };
            decoded += 1;
            self.dispatcher.dispatch(&Notification::Activity);

            match message.event {
                MidiEvent::NoteOn {
                    note,
                    velocity_norm,
                } => self.dispatcher.dispatch(&Notification::Note {
                    note,
                    velocity_norm,
                }),
                MidiEvent::NoteOff { note } => {
                    self.dispatcher.dispatch(&Notification::NoteReleased { note })
                }
                MidiEvent::ControlChange {
                    controller,
                    value_norm,
                } => self.dispatcher.dispatch(&Notification::ControlChange {
                    controller,
                    value_norm,
                }),
                realtime => {
                    for notification in self.clock.handle(&realtime, message.timestamp) {
                        self.dispatcher.dispatch(&notification);
                    }
                }
            }
        }
        decoded
    }

    /// Smoothed tempo, 0 when no estimate is available.
    pub fn bpm(&self) -> f32 {
        self.clock.bpm().unwrap_or(0.0) as f32
    }

    pub fn beat_position(&self) -> f32 {
        self.clock.beat_position() as f32
    }

    pub fn clock(&self) -> &ClockTracker {
        &self.clock
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }
}

impl std::fmt::Debug for MidiSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiSync")
            .field("backend", &self.backend.kind())
            .field("open", &self.backend.is_open())
            .field("clock", &self.clock)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Probes for native capture and falls back to host delivery.
pub fn select_backend(config: &MidiConfig, feed: HostMidiFeed) -> Box<dyn CaptureBackend> {
    if config.prefer_native {
        match detect_native(config) {
            Ok(backend) => {
                info!(backend = ?BackendKind::Native, "selected MIDI capture backend");
                return backend;
            }
            Err(err) => info!(%err, "native MIDI capture unavailable, using fallback"),
        }
    }

    info!(backend = ?BackendKind::Fallback, "selected MIDI capture backend");
    Box::new(FallbackBackend::new(feed))
}

#[cfg(feature = "native")]
fn detect_native(config: &MidiConfig) -> Result<Box<dyn CaptureBackend>> {
    use crate::capture::{MidirDriver, NativeBackend};

    let driver = MidirDriver::detect(&config.client_name)?;
    Ok(Box::new(NativeBackend::new(driver, config.queue_capacity)))
}

#[cfg(not(feature = "native"))]
fn detect_native(_config: &MidiConfig) -> Result<Box<dyn CaptureBackend>> {
    Err(crate::MidiSyncError::NoCapability(
        "built without the `native` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::capture::testing::ScriptedDriver;
    use crate::capture::{HostMidiEvent, NativeBackend};
    use crate::MidiSyncError;

    fn native_sync(ports: &[&str], config: &MidiConfig) -> (MidiSync, ScriptedDriver) {
        let driver = ScriptedDriver::with_ports(ports);
        let backend = NativeBackend::new(driver.clone(), config.queue_capacity);
        (MidiSync::with_backend(config, Box::new(backend)), driver)
    }

    fn record(sync: &mut MidiSync) -> Rc<RefCell<Vec<Notification>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        sync.dispatcher_mut()
            .subscribe(move |n: &Notification| sink.borrow_mut().push(*n));
        seen
    }

    #[test]
    fn falls_back_when_native_is_not_preferred() {
        let config = MidiConfig {
            prefer_native: false,
            ..Default::default()
        };
        let sync = MidiSync::new(&config, HostMidiFeed::new(8));
        assert_eq!(sync.backend_kind(), BackendKind::Fallback);
        assert!(!sync.is_port_open());
    }

    #[test]
    fn auto_connect_opens_configured_port() {
        let config = MidiConfig {
            auto_connect: true,
            auto_connect_port: 1,
            ..Default::default()
        };
        let (sync, driver) = native_sync(&["A", "B"], &config);
        assert!(sync.is_open());
        assert_eq!(sync.selected_port(), Some(1));
        assert_eq!(driver.open_connections(), 1);
    }

    #[test]
    fn failed_auto_connect_is_not_fatal() {
        let config = MidiConfig {
            auto_connect: true,
            ..Default::default()
        };
        let (sync, _) = native_sync(&[], &config);
        assert!(!sync.is_open());
    }

    #[test]
    fn invalid_port_keeps_port_closed() {
        let (mut sync, _) = native_sync(&["A", "B", "C"], &MidiConfig::default());
        let err = sync.open(5).unwrap_err();
        assert!(matches!(err, MidiSyncError::InvalidPort { index: 5, count: 3 }));
        assert!(!sync.is_port_open());
    }

    #[test]
    fn notes_and_controls_are_dispatched_after_activity() {
        let (mut sync, driver) = native_sync(&["A"], &MidiConfig::default());
        let seen = record(&mut sync);
        sync.open(0).unwrap();

        driver.emit(&[0x90, 60, 127], 0.0);
        driver.emit(&[0x90, 60, 0], 0.1);
        driver.emit(&[0xB2, 74, 0], 0.2);
        driver.emit(&[0xC0, 5], 0.3);

        assert_eq!(sync.update(), 3);
        assert_eq!(
            *seen.borrow(),
            vec![
                Notification::Activity,
                Notification::Note {
                    note: 60,
                    velocity_norm: 1.0
                },
                Notification::Activity,
                Notification::NoteReleased { note: 60 },
                Notification::Activity,
                Notification::ControlChange {
                    controller: 74,
                    value_norm: 0.0
                },
            ]
        );
    }

    #[test]
    fn clock_stream_drives_tempo_and_beats() {
        let (mut sync, driver) = native_sync(&["Clock"], &MidiConfig::default());
        let seen = record(&mut sync);
        sync.open(0).unwrap();

        let delta = 60.0 / (128.0 * 24.0);
        driver.emit(&[0xFA], 0.0);
        for tick in 0..24 {
            driver.emit(&[0xF8], 1.0 + tick as f64 * delta);
        }
        sync.update();

        assert!((sync.bpm() - 128.0).abs() < 1e-3);
        assert_eq!(sync.clock().beat_count(), 1);
        assert_eq!(sync.beat_position(), 1.0);

        let seen = seen.borrow();
        assert_eq!(seen[1], Notification::TransportStarted);
        let clocks = seen
            .iter()
            .filter(|n| **n == Notification::ClockActivity)
            .count();
        assert_eq!(clocks, 24);
        assert_eq!(seen.last(), Some(&Notification::Beat { beat_number: 1 }));
    }

    #[test]
    fn stopped_clock_still_reports_activity() {
        let (mut sync, driver) = native_sync(&["Clock"], &MidiConfig::default());
        let seen = record(&mut sync);
        sync.open(0).unwrap();
        driver.emit(&[0xFA], 0.0);
        for tick in 0..30 {
            driver.emit(&[0xF8], tick as f64 * 0.02);
        }
        driver.emit(&[0xFC], 0.7);
        sync.update();
        let frozen = sync.beat_position();
        assert_eq!(seen.borrow().last(), Some(&Notification::TransportStopped));

        seen.borrow_mut().clear();
        for tick in 0..10 {
            driver.emit(&[0xF8], 1.0 + tick as f64 * 0.02);
        }
        sync.update();

        assert_eq!(sync.beat_position(), frozen);
        let clocks = seen
            .borrow()
            .iter()
            .filter(|n| **n == Notification::ClockActivity)
            .count();
        assert_eq!(clocks, 10);

        driver.emit(&[0xFB], 2.0);
        sync.update();
        assert_eq!(seen.borrow().last(), Some(&Notification::TransportContinued));
        assert!(sync.clock().is_playing());
    }

    #[test]
    fn close_resets_clock_and_is_idempotent() {
        let (mut sync, driver) = native_sync(&["Clock"], &MidiConfig::default());
        assert!(sync.close().is_ok());

        sync.open(0).unwrap();
        driver.emit(&[0xFA], 0.0);
        driver.emit(&[0xF8], 0.0);
        driver.emit(&[0xF8], 0.02);
        sync.update();
        assert!(sync.bpm() > 0.0);

        assert!(sync.close().is_ok());
        assert!(sync.close().is_ok());
        assert_eq!(sync.bpm(), 0.0);
        assert_eq!(sync.beat_position(), 0.0);
        assert!(!sync.clock().is_playing());
        assert!(!sync.is_port_open());
    }

    #[test]
    fn fallback_pipeline_matches_native_behaviour() {
        let feed = HostMidiFeed::new(64);
        feed.set_connected_inputs(["Host Keys"]);
        let config = MidiConfig {
            prefer_native: false,
            auto_connect: true,
            ..Default::default()
        };
        let mut sync = MidiSync::new(&config, feed.clone());
        let seen = record(&mut sync);
        assert!(sync.is_open());
        assert_eq!(sync.port_names(), vec!["Host Keys".to_string()]);

        feed.deliver_at(HostMidiEvent::new(0xFA, 0, 0, 0), 0.0);
        feed.deliver_at(HostMidiEvent::new(0xF8, 0, 0, 0), 0.0);
        feed.deliver_at(HostMidiEvent::new(0xF8, 0, 0, 0), 0.025);
        feed.deliver_at(HostMidiEvent::new(0x9, 4, 36, 64), 0.03);
        assert_eq!(sync.update(), 4);

        assert!((sync.bpm() - 100.0).abs() < 1e-3);
        assert!(seen.borrow().contains(&Notification::Note {
            note: 36,
            velocity_norm: 64.0 / 127.0
        }));

        sync.close().unwrap();
        assert_eq!(sync.bpm(), 0.0);
        feed.deliver(HostMidiEvent::new(0xF8, 0, 0, 0));
        assert_eq!(sync.update(), 0);
    }
}
