//! Splitting long holds at page boundaries.

use crate::chart::{Chart, NoteId, NoteKind, Tick};
use crate::error::{ChartError, Result};
use serde::Serialize;

/// The part of a long hold drawn on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HoldSegment {
    pub note_id: NoteId,
    pub page_index: usize,
    pub tick: Tick,
    pub duration: Tick,
    /// The hold ends on this segment's page.
    pub ended: bool,
}

/// Splits every long hold into one segment per page it spans.
///
/// A hold that fits inside its originating page yields a single ended
/// segment. Otherwise the first segment runs to the page end, middle pages
/// are covered completely, and the last segment starts at its page's start.
/// Segment durations always sum to the hold length.
///
/// # Errors
///
/// `UncoveredTimeRange` if a hold runs past the last page.
pub fn split_long_holds(chart: &Chart) -> Result<Vec<HoldSegment>> {
    let pages = chart.pages();
    let mut segments = Vec::new();

    for note in chart
        .notes()
        .iter()
        .filter(|n| n.kind == NoteKind::LongHold)
    {
        let mut page_index = note.page_index;
        let mut tick = note.tick;
        let mut remaining = note.hold_ticks;
        loop {
            let page = pages.get(page_index).ok_or_else(|| {
                ChartError::UncoveredTimeRange(format!(
                    "long hold {} runs past the last page (ends at tick {})",
                    note.id.as_i64(),
                    note.end_tick()
                ))
            })?;
            let available = page.end_tick - tick;
            if remaining <= available {
                segments.push(HoldSegment {
                    note_id: note.id,
                    page_index,
                    tick,
                    duration: remaining,
                    ended: true,
                });
                break;
            }
            if available > 0 {
                segments.push(HoldSegment {
                    note_id: note.id,
                    page_index,
                    tick,
                    duration: available,
                    ended: false,
                });
                remaining -= available;
            }
            page_index += 1;
            tick = page.end_tick;
        }
    }
    Ok(segments)
}
