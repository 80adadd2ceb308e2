//! Chart statistics.
//!
//! Counts of pages, tempo changes, events and notes, as shown next to a
//! rendered chart.

use crate::chart::{Chart, NoteKind, ScanDirection};
use serde::Serialize;
use std::collections::BTreeMap;

/// Pages by scan direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageCounts {
    pub total: usize,
    pub forward: usize,
    pub reverse: usize,
}

/// Tempo events and the direction of every change between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TempoCounts {
    pub total: usize,
    /// Changes to a shorter beat.
    pub accelerations: usize,
    /// Changes to a longer beat.
    pub decelerations: usize,
}

/// `total` counts event orders; the categories count the events inside them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub total: usize,
    /// Event types 0 and 1.
    pub tempo: usize,
    /// Event types 2 through 7.
    pub ui: usize,
    /// Event type 8.
    pub text: usize,
}

/// Notes by kind and side of the play area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteCounts {
    pub total: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
    /// Notes left of center.
    pub left: usize,
    /// Notes right of center.
    pub right: usize,
}

/// Summary counts shown alongside a chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChartStatistics {
    pub pages: PageCounts,
    pub tempos: TempoCounts,
    pub events: EventCounts,
    pub notes: NoteCounts,
}

impl ChartStatistics {
    /// Collects statistics for a chart.
    pub fn collect(chart: &Chart) -> Self {
        let pages = chart.pages();
        let forward = pages
            .iter()
            .filter(|p| p.scan_direction == ScanDirection::Forward)
            .count();

        let tempos = chart.tempo_events();
        let mut tempo_counts = TempoCounts {
            total: tempos.len(),
            ..TempoCounts::default()
        };
        for pair in tempos.windows(2) {
            let (current, next) = (pair[0].micros_per_beat, pair[1].micros_per_beat);
            if next < current {
                tempo_counts.accelerations += 1;
            } else if next > current {
                tempo_counts.decelerations += 1;
            }
        }

        let mut events = EventCounts {
            total: chart.event_orders().len(),
            ..EventCounts::default()
        };
        for event in chart.event_orders().iter().flat_map(|o| &o.event_list) {
            match event.kind {
                0..=1 => events.tempo += 1,
                2..=7 => events.ui += 1,
                8 => events.text += 1,
                _ => {}
            }
        }

        let mut notes = NoteCounts {
            total: chart.notes().len(),
            by_kind: NoteKind::ALL.iter().map(|k| (k.name(), 0)).collect(),
            ..NoteCounts::default()
        };
        for note in chart.notes() {
            *notes.by_kind.entry(note.kind.name()).or_insert(0) += 1;
            if note.x < 0.5 {
                notes.left += 1;
            } else if note.x > 0.5 {
                notes.right += 1;
            }
        }

        Self {
            pages: PageCounts {
                total: pages.len(),
                forward,
                reverse: pages.len() - forward,
            },
            tempos: tempo_counts,
            events,
            notes,
        }
    }
}
