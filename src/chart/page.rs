//! Page representation.
//!
//! A page is a bounded tick interval shown as one panel; the scan line sweeps
//! across it in the page's direction.

use super::Tick;
use serde::{Deserialize, Serialize};

/// Direction the scan line travels across a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// Scan line moves upwards (`scan_line_direction = 1`).
    Forward,
    /// Scan line moves downwards (`scan_line_direction = -1`).
    Reverse,
}

impl ScanDirection {
    /// Parses the schema value; only `1` and `-1` are valid.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ScanDirection::Forward),
            -1 => Some(ScanDirection::Reverse),
            _ => None,
        }
    }

    /// Returns the schema value.
    pub fn code(self) -> i64 {
        match self {
            ScanDirection::Forward => 1,
            ScanDirection::Reverse => -1,
        }
    }
}

/// Vertical travel parameters of a page.
///
/// Only `kind == 0` (identity) is understood by the geometry compiler; other
/// kinds are carried so they can be reported, not interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFunction {
    pub kind: i64,
    /// Fraction of the play area the scan line travels, 0.0 to 1.0.
    pub amplitude: f64,
    /// Vertical offset of the band, -1.0 (bottom) to 1.0 (top).
    pub center: f64,
}

impl PositionFunction {
    /// The identity function: full height, centered.
    pub const IDENTITY: PositionFunction = PositionFunction {
        kind: 0,
        amplitude: 1.0,
        center: 0.0,
    };
}

impl Default for PositionFunction {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A page of the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub start_tick: Tick,
    pub end_tick: Tick,
    pub scan_direction: ScanDirection,
    pub position_function: PositionFunction,
    /// Whether the chart file spelled out the position function. Pages
    /// without one are written back without it.
    pub explicit_position: bool,
}

impl Page {
    /// Creates a page with the identity position function.
    pub fn new(start_tick: Tick, end_tick: Tick, scan_direction: ScanDirection) -> Self {
        Self {
            start_tick,
            end_tick,
            scan_direction,
            position_function: PositionFunction::IDENTITY,
            explicit_position: false,
        }
    }

    /// Replaces the position function.
    pub fn with_position(mut self, position_function: PositionFunction) -> Self {
        self.position_function = position_function;
        self.explicit_position = true;
        self
    }

    /// Page length in ticks.
    pub fn duration_ticks(&self) -> Tick {
        self.end_tick - self.start_tick
    }

    /// Whether `tick` lies in `[start_tick, end_tick)`.
    pub fn contains(&self, tick: Tick) -> bool {
        tick >= self.start_tick && tick < self.end_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_direction_codes() {
        assert_eq!(ScanDirection::from_code(1), Some(ScanDirection::Forward));
        assert_eq!(ScanDirection::from_code(-1), Some(ScanDirection::Reverse));
        assert_eq!(ScanDirection::from_code(0), None);
        assert_eq!(ScanDirection::Reverse.code(), -1);
    }

    #[test]
    fn test_page_contains() {
        let page = Page::new(960, 1920, ScanDirection::Forward);
        assert_eq!(page.duration_ticks(), 960);
        assert!(page.contains(960));
        assert!(page.contains(1919));
        assert!(!page.contains(1920));
        assert!(!page.explicit_position);
    }
}
