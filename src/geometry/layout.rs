//! Note placement within a page.
//!
//! Vertical coordinates are fractions of the play area, 0.0 at the top.

use crate::chart::{Chart, Note, NoteId, Page, ScanDirection, Tick};
use serde::Serialize;

/// Vertical band the scan line sweeps on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageBand {
    pub top: f64,
    pub bottom: f64,
}

impl PageBand {
    /// Band of a page from its position function.
    pub fn of(page: &Page) -> Self {
        let function = &page.position_function;
        let middle = (1.0 - function.center) / 2.0;
        let top = middle - function.amplitude / 2.0;
        Self {
            top,
            bottom: top + function.amplitude,
        }
    }

    /// Height of the scan line at `tick` on `page`.
    ///
    /// A forward page sweeps from the bottom of the band to the top, a
    /// reverse page from the top to the bottom.
    pub fn y_at(&self, page: &Page, tick: Tick) -> f64 {
        let duration = page.duration_ticks();
        let progress = if duration == 0 {
            0.0
        } else {
            (tick - page.start_tick) as f64 / duration as f64
        };
        let travel = match page.scan_direction {
            ScanDirection::Forward => 1.0 - progress,
            ScanDirection::Reverse => progress,
        };
        self.top + (self.bottom - self.top) * travel
    }
}

/// Where a note is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NotePosition {
    pub note_id: NoteId,
    pub x: f64,
    pub y: f64,
}

/// Position of `note` when drawn on `page`.
pub fn note_position(page: &Page, note: &Note) -> NotePosition {
    NotePosition {
        note_id: note.id,
        x: note.x,
        y: PageBand::of(page).y_at(page, note.tick),
    }
}

/// Notes drawn on page `index`. Forward notes appear one page early.
pub fn notes_on_page(chart: &Chart, index: usize) -> Vec<&Note> {
    chart
        .notes()
        .iter()
        .filter(|n| {
            (n.page_index == index && !n.is_forward) || (n.page_index == index + 1 && n.is_forward)
        })
        .collect()
}

/// Positions of every note drawn on page `index`; empty if there is no
/// such page.
pub fn page_layout(chart: &Chart, index: usize) -> Vec<NotePosition> {
    let Some(page) = chart.pages().get(index) else {
        return Vec::new();
    };
    notes_on_page(chart, index)
        .into_iter()
        .map(|note| note_position(page, note))
        .collect()
}
