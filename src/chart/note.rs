//! Chart note representation.
//!
//! A note is a single judged object on the chart: a position on the lane,
//! a start tick, an optional hold length and a kind. Drag-family notes are
//! chained together through `next_id`.

use super::Tick;
use crate::error::{ChartError, Result};
use serde::{Deserialize, Serialize};

/// Identifier of a note within its chart, as written in the chart file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl NoteId {
    /// Returns the raw ID value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// The gameplay kind of a note.
///
/// The discriminants are the type codes used by the tick-domain chart schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Tap = 0,
    Hold = 1,
    LongHold = 2,
    DragHead = 3,
    DragChild = 4,
    Flick = 5,
    ComboDragHead = 6,
    ComboDragChild = 7,
    ComboTap = 8,
    DropDrag = 9,
}

impl NoteKind {
    /// All kinds in type-code order.
    pub const ALL: [NoteKind; 10] = [
        NoteKind::Tap,
        NoteKind::Hold,
        NoteKind::LongHold,
        NoteKind::DragHead,
        NoteKind::DragChild,
        NoteKind::Flick,
        NoteKind::ComboDragHead,
        NoteKind::ComboDragChild,
        NoteKind::ComboTap,
        NoteKind::DropDrag,
    ];

    /// Parses a schema type code.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedNoteKind` for codes outside 0-9.
    pub fn from_code(code: i64) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(ChartError::UnsupportedNoteKind(code))
    }

    /// Returns the schema type code.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Whether notes of this kind take part in drag chains.
    pub fn is_drag_family(self) -> bool {
        matches!(
            self,
            NoteKind::DragHead
                | NoteKind::DragChild
                | NoteKind::ComboDragHead
                | NoteKind::ComboDragChild
        )
    }

    /// Whether this kind is a dragged-over child rather than a struck onset.
    pub fn is_drag_child(self) -> bool {
        matches!(
            self,
            NoteKind::DragChild | NoteKind::ComboDragChild | NoteKind::DropDrag
        )
    }

    /// Short lowercase name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            NoteKind::Tap => "tap",
            NoteKind::Hold => "hold",
            NoteKind::LongHold => "long_hold",
            NoteKind::DragHead => "drag_head",
            NoteKind::DragChild => "drag_child",
            NoteKind::Flick => "flick",
            NoteKind::ComboDragHead => "combo_drag_head",
            NoteKind::ComboDragChild => "combo_drag_child",
            NoteKind::ComboTap => "combo_tap",
            NoteKind::DropDrag => "drop_drag",
        }
    }
}

/// A single note on the chart.
///
/// `previous_id` is never read from input; the owning [`Chart`](super::Chart)
/// derives it from the drag chain when it is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Identifier referenced by drag chains.
    pub id: NoteId,

    /// Start position in ticks.
    pub tick: Tick,

    /// Lane position, 0.0 (left edge) to 1.0 (right edge).
    pub x: f64,

    /// Hold length in ticks; 0 for notes that are not held.
    pub hold_ticks: Tick,

    /// Gameplay kind.
    pub kind: NoteKind,

    /// Next note in the drag chain, if any.
    pub next_id: Option<NoteId>,

    /// Previous note in the drag chain, derived from `next_id` links.
    pub previous_id: Option<NoteId>,

    /// Index of the page the note belongs to.
    pub page_index: usize,

    /// Set for notes that sit exactly on a page boundary and are shown on the
    /// preceding page.
    pub is_forward: bool,

    /// Passthrough flag from the chart file.
    pub has_sibling: bool,
}

impl Note {
    /// Creates a note on page 0 with no chain links.
    ///
    /// # Examples
    ///
    /// ```
    /// use chartkit::chart::{Note, NoteId, NoteKind};
    ///
    /// let note = Note::new(NoteId(0), NoteKind::Tap, 480, 0.5);
    /// assert_eq!(note.end_tick(), 480);
    /// ```
    pub fn new(id: NoteId, kind: NoteKind, tick: Tick, x: f64) -> Self {
        Self {
            id,
            tick,
            x,
            hold_ticks: 0,
            kind,
            next_id: None,
            previous_id: None,
            page_index: 0,
            is_forward: false,
            has_sibling: false,
        }
    }

    /// Sets the hold length.
    pub fn with_hold(mut self, hold_ticks: Tick) -> Self {
        self.hold_ticks = hold_ticks;
        self
    }

    /// Sets the page index.
    pub fn on_page(mut self, page_index: usize) -> Self {
        self.page_index = page_index;
        self
    }

    /// Links this note to its drag successor.
    pub fn linked_to(mut self, next: NoteId) -> Self {
        self.next_id = Some(next);
        self
    }

    /// Returns the tick at which the note's hold ends.
    pub fn end_tick(&self) -> Tick {
        self.tick + self.hold_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in NoteKind::ALL {
            assert_eq!(NoteKind::from_code(kind.code()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_code() {
        assert!(matches!(
            NoteKind::from_code(10),
            Err(ChartError::UnsupportedNoteKind(10))
        ));
        assert!(matches!(
            NoteKind::from_code(-1),
            Err(ChartError::UnsupportedNoteKind(-1))
        ));
    }

    #[test]
    fn test_drag_family() {
        assert!(NoteKind::DragHead.is_drag_family());
        assert!(NoteKind::ComboDragChild.is_drag_family());
        assert!(!NoteKind::DropDrag.is_drag_family());
        assert!(NoteKind::DropDrag.is_drag_child());
        assert!(!NoteKind::DragHead.is_drag_child());
        assert!(!NoteKind::Tap.is_drag_family());
    }

    #[test]
    fn test_note_builder() {
        let note = Note::new(NoteId(3), NoteKind::LongHold, 100, 0.25)
            .with_hold(200)
            .on_page(2);
        assert_eq!(note.end_tick(), 300);
        assert_eq!(note.page_index, 2);
        assert_eq!(note.next_id, None);
    }
}
