//! Chart data structures and the tempo timeline.
//!
//! This module provides the normalized, tick-indexed chart model together with
//! the codecs that produce it (tick-domain JSON and the legacy seconds-based
//! text format) and the tempo timeline used to map between ticks and time.

mod document;
mod event;
mod legacy_import;
mod note;
mod page;
mod retime;
mod schema;
mod tempo;
mod timeline;

pub use document::Chart;
pub use event::{ChartEvent, EventOrder};
pub use legacy_import::{convert_legacy, parse_legacy, LegacyChart, LegacyConversion, LegacyNote};
pub use note::{Note, NoteId, NoteKind};
pub use page::{Page, PositionFunction, ScanDirection};
pub use retime::{RetimePlan, RetimeStep};
pub use schema::ChartFile;
pub use tempo::TempoEvent;
pub use timeline::{search_last_at_or_before, TempoTimeline};

/// Tick position. Signed so that retime deltas and the legacy "inherit the
/// previous end" page marker (a negative start) can be represented directly.
pub type Tick = i64;

/// Ticks per quarter note used for charts converted from the legacy format.
pub const LEGACY_TIME_BASE: i64 = 480;

/// Trailing space appended after the last legacy note so renderers have room
/// to scroll past it.
pub const LEGACY_PAGE_PADDING_TICKS: i64 = 1920;

/// Lower bound of the legacy tempo estimate before it is doubled once.
pub const LEGACY_MIN_BPM: f64 = 100.0;

/// Upper bound of the legacy tempo estimate before it is halved once.
pub const LEGACY_MAX_BPM: f64 = 250.0;

/// Microseconds in one minute; `MICROS_PER_MINUTE / micros_per_beat` is BPM.
pub const MICROS_PER_MINUTE: f64 = 6e7;

/// Converts a microseconds-per-beat tempo value to beats per minute.
///
/// # Examples
///
/// ```
/// use chartkit::chart::micros_to_bpm;
///
/// assert_eq!(micros_to_bpm(500_000.0), 120.0);
/// ```
pub fn micros_to_bpm(micros_per_beat: f64) -> f64 {
    MICROS_PER_MINUTE / micros_per_beat
}

/// Converts beats per minute to a microseconds-per-beat tempo value.
pub fn bpm_to_micros(bpm: f64) -> f64 {
    MICROS_PER_MINUTE / bpm
}

/// Rounds a BPM value to the two decimals shown to users.
///
/// Two tempo events whose display values match are indistinguishable on
/// screen, which is what tempo coalescing keys on.
pub fn bpm_display(micros_per_beat: f64) -> f64 {
    round_to(micros_to_bpm(micros_per_beat), 2)
}

/// Rounds `value` to `digits` decimal places.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

/// Rounds a fractional tick to the nearest whole tick.
#[inline]
pub fn round_tick(value: f64) -> Tick {
    value.round() as Tick
}
