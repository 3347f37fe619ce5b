//! Byte level MIDI decoding.
//!
//! Turns raw `(status, data1, data2)` triples into the small set of semantic
//! events the visual layers care about. Anything else (program change, pitch
//! bend, SysEx, ...) decodes to `None` and is dropped silently.

use serde::{Deserialize, Serialize};

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const TIMING_CLOCK: u8 = 0xF8;
pub const START: u8 = 0xFA;
pub const CONTINUE: u8 = 0xFB;
pub const STOP: u8 = 0xFC;

const DATA_MAX: u8 = 127;

/// Message as delivered by a capture backend, before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
    /// Arrival time in seconds. The origin depends on the backend.
    pub timestamp: f64,
}

impl RawMessage {
    pub fn new(status: u8, data1: u8, data2: u8, timestamp: f64) -> Self {
        Self {
            status,
            data1,
            data2,
            timestamp,
        }
    }

    /// Builds a message from a variable length driver payload. Missing data
    /// bytes read as zero; an empty payload yields `None`.
    pub fn from_bytes(bytes: &[u8], timestamp: f64) -> Option<Self> {
        let (&status, rest) = bytes.split_first()?;
        Some(Self {
            status,
            data1: rest.first().copied().unwrap_or(0),
            data2: rest.get(1).copied().unwrap_or(0),
            timestamp,
        })
    }
}

/// Semantic MIDI event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity_norm: f32 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value_norm: f32 },
    Clock,
    TransportStart,
    TransportStop,
    TransportContinue,
}

impl MidiEvent {
    /// True for the system real-time messages consumed by the clock tracker.
    pub fn is_realtime(&self) -> bool {
        matches!(
            self,
            MidiEvent::Clock
                | MidiEvent::TransportStart
                | MidiEvent::TransportStop
                | MidiEvent::TransportContinue
        )
    }
}

/// A decoded event together with the routing data consumers may filter on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedMessage {
    pub event: MidiEvent,
    /// Channel nibble for channel voice messages, `None` for system messages.
    pub channel: Option<u8>,
    pub timestamp: f64,
}

/// Decodes a status/data triple. Returns `None` for unsupported messages.
pub fn decode(status: u8, data1: u8, data2: u8) -> Option<MidiEvent> {
    let data1 = data1.min(DATA_MAX);
    let data2 = data2.min(DATA_MAX);

    match status {
        TIMING_CLOCK => return Some(MidiEvent::Clock),
        START => return Some(MidiEvent::TransportStart),
        CONTINUE => return Some(MidiEvent::TransportContinue),
        STOP => return Some(MidiEvent::TransportStop),
        _ => {}
    }

    match status & 0xF0 {
        NOTE_ON if data2 == 0 => Some(MidiEvent::NoteOff { note: data1 }),
        NOTE_ON => Some(MidiEvent::NoteOn {
            note: data1,
            velocity_norm: normalise(data2),
        }),
        NOTE_OFF => Some(MidiEvent::NoteOff { note: data1 }),
        CONTROL_CHANGE => Some(MidiEvent::ControlChange {
            controller: data1,
            value_norm: normalise(data2),
        }),
        _ => None,
    }
}

/// Decodes a [`RawMessage`], keeping the channel and timestamp around.
pub fn decode_message(raw: &RawMessage) -> Option<DecodedMessage> {
    let event = decode(raw.status, raw.data1, raw.data2)?;
    Some(DecodedMessage {
        event,
        channel: channel_of(raw.status),
        timestamp: raw.timestamp,
    })
}

/// Channel nibble of a channel voice status byte.
pub fn channel_of(status: u8) -> Option<u8> {
    (0x80..0xF0).contains(&status).then_some(status & 0x0F)
}

fn normalise(value: u8) -> f32 {
    (value as f32 / DATA_MAX as f32).clamp(0.0, 1.0)
}
