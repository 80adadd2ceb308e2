//! Tempo change events.

use super::{micros_to_bpm, Tick};
use serde::Serialize;

/// A point where the tempo changes.
///
/// Each event defines a constant-tempo segment that lasts until the next
/// event. `derived_time_ms` is the absolute time of `tick` and is filled in
/// by the [`TempoTimeline`](super::TempoTimeline) that owns the event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoEvent {
    pub tick: Tick,
    pub micros_per_beat: f64,
    pub derived_time_ms: f64,
}

impl TempoEvent {
    /// Creates an event whose absolute time has not been derived yet.
    pub fn new(tick: Tick, micros_per_beat: f64) -> Self {
        Self {
            tick,
            micros_per_beat,
            derived_time_ms: 0.0,
        }
    }

    /// Tempo in beats per minute.
    pub fn bpm(&self) -> f64 {
        micros_to_bpm(self.micros_per_beat)
    }

    /// Milliseconds per tick at this tempo for the given time base.
    pub fn ms_per_tick(&self, time_base: i64) -> f64 {
        self.micros_per_beat / 1000.0 / time_base as f64
    }
}
