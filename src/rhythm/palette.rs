//! Colors and accent marks for subdivision orders.

use serde::{Serialize, Serializer};
use std::fmt;

/// An opaque RGB color, displayed as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0 & 0xFF_FFFF)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Orders that exist but have no color of their own.
pub const UNCLASSIFIED: Color = Color(0x9F_9F9F);

/// Intervals longer than a half note.
pub const BELOW_RANGE: Color = Color(0x50_5050);

/// Color per subdivision order. Orders missing here are unclassified.
const SUBDIVISION_COLORS: [(u32, Color); 17] = [
    (2, Color(0x01_00A4)),
    (3, Color(0x01_5B03)),
    (4, Color(0x01_00A4)),
    (5, Color(0x61_0336)),
    (6, Color(0x01_5B03)),
    (7, Color(0x47_2788)),
    (8, Color(0xFE_0000)),
    (9, Color(0x3A_6C6B)),
    (10, Color(0x8E_2874)),
    (12, Color(0xFE_6F06)),
    (14, Color(0x7D_3ED3)),
    (16, Color(0x00_75FF)),
    (18, Color(0x05_9C73)),
    (20, Color(0xFF_4292)),
    (24, Color(0x72_FE2C)),
    (32, Color(0x2C_FCFE)),
    (48, Color(0xFF_FF66)),
];

/// Looks up the color of a subdivision order.
pub fn subdivision_color(order: u32) -> Option<Color> {
    SUBDIVISION_COLORS
        .iter()
        .find(|(o, _)| *o == order)
        .map(|(_, color)| *color)
}

/// Tuplet indicator for an order: the largest of 9, 7, 5, 3 dividing it.
pub fn accent_divisor(order: u32) -> Option<u32> {
    [9, 7, 5, 3].into_iter().find(|d| order % d == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_display() {
        assert_eq!(Color(0x0100A4).to_string(), "#0100A4");
        assert_eq!(UNCLASSIFIED.to_string(), "#9F9F9F");
        assert_eq!(serde_json::to_string(&BELOW_RANGE).unwrap(), "\"#505050\"");
    }

    #[test]
    fn test_sparse_table() {
        assert_eq!(subdivision_color(16), Some(Color(0x0075FF)));
        assert_eq!(subdivision_color(11), None);
        assert_eq!(subdivision_color(64), None);
    }

    #[test]
    fn test_accent_prefers_largest_divisor() {
        assert_eq!(accent_divisor(18), Some(9));
        assert_eq!(accent_divisor(6), Some(3));
        assert_eq!(accent_divisor(10), Some(5));
        assert_eq!(accent_divisor(14), Some(7));
        assert_eq!(accent_divisor(16), None);
    }
}
