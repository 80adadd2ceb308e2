//! Rhythm analysis of note spacing.
//!
//! Every rhythmic onset is labelled with the subdivision implied by the
//! distance to its closest neighbor. The result is display metadata only and
//! is never written back into the chart.

mod palette;
mod subdivision;

pub use palette::{accent_divisor, subdivision_color, Color, BELOW_RANGE, UNCLASSIFIED};
pub use subdivision::{classify_interval, classify_with_tolerance, subdivision_order, Subdivision};

use crate::chart::{Chart, NoteKind, Tick};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// How far (in milliseconds) an interval may drift from an exact
/// subdivision and still be snapped to it.
pub const RHYTHM_TOLERANCE_MS: f64 = 5.0;

/// One rhythmic onset: every non-child note at a given tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RhythmEntry {
    pub tick: Tick,
    pub time_ms: f64,
    /// Kinds of all notes at this tick, in chart order.
    pub kinds: Vec<NoteKind>,
    /// More than one note shares the tick.
    pub merged: bool,
    /// Only sustained or drag-start notes; drawn dashed and left unclassified.
    pub dashed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdivision: Option<Subdivision>,
}

fn is_dashed_kind(kind: NoteKind) -> bool {
    matches!(kind, NoteKind::DragHead | NoteKind::Hold | NoteKind::LongHold)
}

/// Classifies every rhythmic onset of a chart, ordered by tick.
pub fn classify_chart(chart: &Chart) -> Vec<RhythmEntry> {
    let mut onsets: BTreeMap<Tick, Vec<NoteKind>> = BTreeMap::new();
    for note in chart.notes().iter().filter(|n| !n.kind.is_drag_child()) {
        onsets.entry(note.tick).or_default().push(note.kind);
    }

    let ticks: Vec<Tick> = onsets.keys().copied().collect();
    let entries: Vec<RhythmEntry> = onsets
        .into_iter()
        .enumerate()
        .map(|(i, (tick, kinds))| {
            let dashed = kinds.iter().all(|k| is_dashed_kind(*k));
            let subdivision = (!dashed).then(|| classify_onset(chart, &ticks, i));
            RhythmEntry {
                tick,
                time_ms: chart.tick_to_time(tick),
                merged: kinds.len() > 1,
                kinds,
                dashed,
                subdivision,
            }
        })
        .collect();

    debug!(
        onsets = entries.len(),
        dashed = entries.iter().filter(|e| e.dashed).count(),
        "classified chart rhythm"
    );
    entries
}

/// Distance to the closest neighboring onset.
fn nearest_interval(ticks: &[Tick], index: usize) -> Option<Tick> {
    let tick = ticks[index];
    let before = index.checked_sub(1).map(|i| tick - ticks[i]);
    let after = ticks.get(index + 1).map(|next| next - tick);
    match (before, after) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn classify_onset(chart: &Chart, ticks: &[Tick], index: usize) -> Subdivision {
    let Some(nearest) = nearest_interval(ticks, index) else {
        return Subdivision::below_range();
    };
    let tick = ticks[index];
    let max_limit = chart.time_to_tick(chart.tick_to_time(tick) + RHYTHM_TOLERANCE_MS) - tick;
    classify_with_tolerance(chart.time_base(), nearest, max_limit)
}

/// Counts classified onsets per label. Unlabelled onsets are not counted.
pub fn label_counts(entries: &[RhythmEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for label in entries
        .iter()
        .filter_map(|e| e.subdivision.as_ref())
        .filter_map(|s| s.label.clone())
    {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}
