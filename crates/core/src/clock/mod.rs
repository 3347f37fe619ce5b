//! MIDI clock tracking and tempo estimation.
//!
//! Follows the 24 PPQ timing clock together with the Start/Stop/Continue
//! transport messages and derives a smoothed BPM figure from the spacing of
//! recent ticks.

use std::collections::VecDeque;

use smallvec::SmallVec;

use crate::{MidiEvent, Notification};

/// Timing clock pulses per quarter note.
pub const TICKS_PER_BEAT: u32 = 24;
/// Tick intervals kept for averaging: one quarter note.
pub const INTERVAL_WINDOW: usize = 24;

/// Notifications produced by a single clock or transport message.
pub type ClockOutput = SmallVec<[Notification; 2]>;

/// Beat and tempo state for one open connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockState {
    /// Ticks within the current beat, `0..24`.
    pub clock_count: u32,
    pub beat_count: u64,
    pub is_playing: bool,
    pub last_tick_time: Option<f64>,
    pub tick_intervals: VecDeque<f64>,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            clock_count: 0,
            beat_count: 0,
            is_playing: false,
            last_tick_time: None,
            tick_intervals: VecDeque::with_capacity(INTERVAL_WINDOW),
        }
    }
}

impl ClockState {
    fn clear_tempo(&mut self) {
        self.last_tick_time = None;
        self.tick_intervals.clear();
    }
}

/// State machine over the transport that owns [`ClockState`].
#[derive(Debug, Default)]
pub struct ClockTracker {
    state: ClockState,
}

impl ClockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn beat_count(&self) -> u64 {
        self.state.beat_count
    }

    pub fn clock_count(&self) -> u32 {
        self.state.clock_count
    }

    /// Drops everything, as on port close.
    pub fn reset(&mut self) {
        self.state = ClockState::default();
    }

    /// Feeds one decoded event. Non real-time events are ignored.
    pub fn handle(&mut self, event: &MidiEvent, timestamp: f64) -> ClockOutput {
        let mut out = ClockOutput::new();
        match event {
            MidiEvent::Clock => self.on_tick(timestamp, &mut out),
            MidiEvent::TransportStart => {
                self.state.is_playing = true;
                self.state.clock_count = 0;
                self.state.beat_count = 0;
                self.state.clear_tempo();
                out.push(Notification::TransportStarted);
            }
            MidiEvent::TransportContinue => {
                // Counters resume; the gap since Stop must not count as an interval.
                self.state.is_playing = true;
                self.state.clear_tempo();
                out.push(Notification::TransportContinued);
            }
            MidiEvent::TransportStop => {
                self.state.is_playing = false;
                self.state.clear_tempo();
                out.push(Notification::TransportStopped);
            }
            _ => {}
        }
        out
    }

    fn on_tick(&mut self, timestamp: f64, out: &mut ClockOutput) {
        out.push(Notification::ClockActivity);
        if !self.state.is_playing {
            return;
        }

        let state = &mut self.state;
        if let Some(last) = state.last_tick_time {
            let interval = timestamp - last;
            if interval > 0.0 {
                if state.tick_intervals.len() == INTERVAL_WINDOW {
                    state.tick_intervals.pop_front();
                }
                state.tick_intervals.push_back(interval);
            }
        }
        state.last_tick_time = Some(timestamp);

        state.clock_count += 1;
        if state.clock_count >= TICKS_PER_BEAT {
            state.clock_count = 0;
            state.beat_count += 1;
            out.push(Notification::Beat {
                beat_number: state.beat_count,
            });
        }
    }

    /// Mean of the buffered tick intervals, in seconds.
    pub fn tick_interval_avg(&self) -> Option<f64> {
        let intervals = &self.state.tick_intervals;
        if intervals.is_empty() {
            return None;
        }
        let avg = intervals.iter().sum::<f64>() / intervals.len() as f64;
        (avg > 0.0).then_some(avg)
    }

    /// Smoothed tempo, `None` until two ticks arrived after Start/Continue.
    pub fn bpm(&self) -> Option<f64> {
        self.tick_interval_avg()
            .map(|avg| 60.0 / (avg * TICKS_PER_BEAT as f64))
    }

    /// Fractional beat counter for phase locked animation.
    pub fn beat_position(&self) -> f64 {
        self.state.beat_count as f64 + self.state.clock_count as f64 / TICKS_PER_BEAT as f64
    }
}
