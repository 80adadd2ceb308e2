//! Interval to subdivision classification.
//!
//! An interval of `time_base` ticks (one beat) is order 4, a quarter note;
//! half of it is order 8, and so on. Intervals that are not an exact order
//! are tried as dotted values, then nudged tick by tick within a tolerance
//! to absorb rounding in the source chart.

use super::palette::{accent_divisor, subdivision_color, BELOW_RANGE, UNCLASSIFIED};
use super::Color;
use serde::Serialize;

const INTEGER_EPSILON: f64 = 1e-9;

fn as_integer(value: f64) -> Option<f64> {
    let rounded = value.round();
    (value.is_finite() && (value - rounded).abs() < INTEGER_EPSILON).then_some(rounded)
}

/// Render-only classification of one note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subdivision {
    /// Text shown under the note, e.g. `"8"` or `"4."`. `None` when the
    /// interval has no recognized order.
    pub label: Option<String>,
    pub is_dotted: bool,
    pub color: Color,
    /// Tuplet indicator (3, 5, 7 or 9).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_divisor: Option<u32>,
}

impl Subdivision {
    fn neutral(color: Color) -> Self {
        Self {
            label: None,
            is_dotted: false,
            color,
            accent_divisor: None,
        }
    }

    /// Intervals of a half note or longer.
    pub fn below_range() -> Self {
        Self::neutral(BELOW_RANGE)
    }

    /// Builds the classification of an exact integer order.
    fn from_order(order: f64, dotted: bool) -> Self {
        if order < 2.0 {
            return Self::below_range();
        }
        let order = order as u32;
        match subdivision_color(order) {
            Some(color) => Self {
                label: Some(if dotted {
                    format!("{}.", order)
                } else {
                    order.to_string()
                }),
                is_dotted: dotted,
                color,
                accent_divisor: accent_divisor(order),
            },
            None => Self::neutral(UNCLASSIFIED),
        }
    }
}

/// Subdivision order of an interval: `time_base * 4 / interval`.
pub fn subdivision_order(time_base: i64, interval: f64) -> f64 {
    time_base as f64 * 4.0 / interval
}

/// Classifies an exact interval, without any tolerance.
///
/// Returns `None` when the interval is neither an integer order nor a dotted
/// one.
///
/// # Examples
///
/// ```
/// use chartkit::rhythm::classify_interval;
///
/// let quarter = classify_interval(480, 480.0).unwrap();
/// assert_eq!(quarter.label.as_deref(), Some("4"));
///
/// let dotted_quarter = classify_interval(480, 720.0).unwrap();
/// assert!(dotted_quarter.is_dotted);
/// assert_eq!(dotted_quarter.label.as_deref(), Some("4."));
/// ```
pub fn classify_interval(time_base: i64, interval: f64) -> Option<Subdivision> {
    let v = subdivision_order(time_base, interval);
    if let Some(order) = as_integer(v) {
        return Some(Subdivision::from_order(order, false));
    }
    as_integer(v * 1.5).map(|order| Subdivision::from_order(order, true))
}

/// Offsets `0, +1, -1, +2, -2, ...`.
fn zigzag() -> impl Iterator<Item = i64> {
    std::iter::once(0).chain((1..).flat_map(|n| [n, -n]))
}

/// Classifies the distance to the nearest neighbor, allowing the interval to
/// be off by up to `max_limit` ticks.
///
/// Offsets are tried in zigzag order; an offset is only tried while the
/// previous one stayed below `max_limit`. When none classifies, the label is
/// the rounded order of `nearest` in neutral gray.
pub fn classify_with_tolerance(time_base: i64, nearest: i64, max_limit: i64) -> Subdivision {
    for offset in zigzag() {
        let interval = nearest + offset;
        if interval > 0 {
            if let Some(found) = classify_interval(time_base, interval as f64) {
                return found;
            }
        }
        if offset.abs() >= max_limit {
            break;
        }
    }

    // Labelled from the measured interval, not the last nudged candidate.
    let v = subdivision_order(time_base, nearest as f64);
    if !v.is_finite() || v < 2.0 {
        return Subdivision::below_range();
    }
    Subdivision {
        label: Some(format!("{}", v.round())),
        ..Subdivision::neutral(UNCLASSIFIED)
    }
}
