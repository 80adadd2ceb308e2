//! Retiming corrections.
//!
//! A retime rescales one tempo segment by a ratio and shifts everything after
//! it by the resulting change in length. It is used to repair charts whose
//! encoding drifted (for example a section written at double tempo).

use super::schema::deserialize_tick;
use super::{
    bpm_display, round_tick, Chart, EventOrder, Note, Page, TempoEvent, TempoTimeline, Tick,
};
use crate::error::{ChartError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Position mapping of a single retime step.
#[derive(Debug, Clone, Copy)]
struct Rescale {
    curr: Tick,
    next: Tick,
    ratio: f64,
    delta: Tick,
}

impl Rescale {
    fn new(curr: Tick, next: Tick, ratio: f64) -> Self {
        let new_next = curr + round_tick((next - curr) as f64 * ratio);
        Self {
            curr,
            next,
            ratio,
            delta: new_next - next,
        }
    }

    fn in_window(&self, pos: Tick) -> bool {
        pos >= self.curr && pos < self.next
    }

    /// Maps a position. Continuous at `next`, so adjacent page endpoints
    /// stay equal.
    fn map(&self, pos: Tick) -> Tick {
        if pos < self.curr {
            pos
        } else if pos < self.next {
            self.curr + round_tick((pos - self.curr) as f64 * self.ratio)
        } else {
            pos + self.delta
        }
    }
}

impl Chart {
    /// Rescales the tempo segment starting at `target_tick` by `ratio`.
    ///
    /// The segment's tempo value is divided by `ratio`, every position inside
    /// `[target_tick, next_tempo_tick)` is scaled towards `target_tick`
    /// (note holds inside the window are scaled too) and every position at or
    /// after the next tempo event is shifted by the change in segment length.
    /// The final segment ends at the chart's total length.
    ///
    /// Tempo events are not coalesced here; see [`Chart::coalesce_tempos`]
    /// and [`RetimePlan::apply`].
    ///
    /// # Errors
    ///
    /// - `InvalidRetimeAnchor` if no tempo event starts at `target_tick`
    /// - `InvalidRetimeRatio` if `ratio` is not a finite positive number, or
    ///   if it shrinks the segment so far that the next tempo event lands on
    ///   `target_tick`
    pub fn retime(&self, target_tick: Tick, ratio: f64) -> Result<Chart> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(ChartError::InvalidRetimeRatio(ratio));
        }
        let timeline = self.timeline();
        let index = timeline
            .event_index_at(target_tick)
            .ok_or(ChartError::InvalidRetimeAnchor(target_tick))?;
        let rescale = Rescale::new(
            target_tick,
            timeline.segment_end(index, self.total_ticks()),
            ratio,
        );

        let tempos: Vec<TempoEvent> = timeline
            .events()
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let micros_per_beat = if i == index {
                    event.micros_per_beat / ratio
                } else {
                    event.micros_per_beat
                };
                TempoEvent::new(rescale.map(event.tick), micros_per_beat)
            })
            .collect();
        if tempos.windows(2).any(|pair| pair[0].tick >= pair[1].tick) {
            return Err(ChartError::InvalidRetimeRatio(ratio));
        }

        let notes: Vec<Note> = self
            .notes()
            .iter()
            .map(|note| {
                let mut note = note.clone();
                if rescale.in_window(note.tick) {
                    note.hold_ticks = round_tick(note.hold_ticks as f64 * ratio);
                }
                note.tick = rescale.map(note.tick);
                note
            })
            .collect();

        let event_orders: Vec<EventOrder> = self
            .event_orders()
            .iter()
            .map(|order| {
                let mut order = order.clone();
                order.tick = rescale.map(order.tick);
                order
            })
            .collect();

        let pages: Vec<Page> = self
            .pages()
            .iter()
            .map(|page| {
                let mut page = page.clone();
                page.start_tick = rescale.map(page.start_tick);
                page.end_tick = rescale.map(page.end_tick);
                page
            })
            .collect();

        debug!(
            tick = target_tick,
            ratio,
            window_end = rescale.next,
            delta = rescale.delta,
            "retimed tempo segment"
        );

        let timeline = TempoTimeline::new(self.time_base(), tempos)?;
        self.rebuild(timeline, pages, notes, event_orders)
    }

    /// Drops every tempo event whose displayed BPM (two decimals) equals the
    /// one before it.
    pub fn coalesce_tempos(&self) -> Result<Chart> {
        let mut events: Vec<TempoEvent> = self.tempo_events().to_vec();
        let before = events.len();
        events.dedup_by(|later, earlier| {
            bpm_display(later.micros_per_beat) == bpm_display(earlier.micros_per_beat)
        });
        if events.len() != before {
            info!(dropped = before - events.len(), "coalesced redundant tempo events");
        }
        let timeline = TempoTimeline::new(self.time_base(), events)?;
        self.rebuild(
            timeline,
            self.pages().to_vec(),
            self.notes().to_vec(),
            self.event_orders().to_vec(),
        )
    }
}

/// One retime step: rescale the segment at `tick` by `ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetimeStep {
    #[serde(deserialize_with = "deserialize_tick")]
    pub tick: Tick,
    pub ratio: f64,
}

/// An ordered list of retime steps applied as one correction.
///
/// Serialized as a bare JSON array: `[{"tick": 28800, "ratio": 0.5}, ...]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetimePlan {
    steps: Vec<RetimeStep>,
}

impl RetimePlan {
    /// Creates a plan from steps, applied in the given order.
    pub fn new(steps: Vec<RetimeStep>) -> Self {
        Self { steps }
    }

    /// The correction for the known drift of converted legacy charts: a
    /// section written at double length, its neighbour at half length, and
    /// a later section at double length again.
    pub fn legacy_drift() -> Self {
        Self::new(vec![
            RetimeStep { tick: 28800, ratio: 0.5 },
            RetimeStep { tick: 44160, ratio: 2.0 },
            RetimeStep { tick: 115200, ratio: 0.5 },
        ])
    }

    /// Steps in application order.
    pub fn steps(&self) -> &[RetimeStep] {
        &self.steps
    }

    /// Applies every step in order, then coalesces redundant tempo events.
    ///
    /// Each step's tick refers to the chart as produced by the previous step.
    ///
    /// # Errors
    ///
    /// The first failing step's error; the input chart is left untouched.
    pub fn apply(&self, chart: &Chart) -> Result<Chart> {
        let mut current = chart.clone();
        for step in &self.steps {
            current = current.retime(step.tick, step.ratio)?;
        }
        current.coalesce_tempos()
    }

    /// Parses a plan from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a plan from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{NoteId, NoteKind, ScanDirection};

    /// 120 BPM, 150 BPM from tick 960, 200 BPM from tick 1920.
    fn sample_chart() -> Chart {
        let timeline = TempoTimeline::new(
            480,
            vec![
                TempoEvent::new(0, 500_000.0),
                TempoEvent::new(960, 400_000.0),
                TempoEvent::new(1920, 300_000.0),
            ],
        )
        .unwrap();
        let pages = vec![
            Page::new(0, 1920, ScanDirection::Forward),
            Page::new(1920, 3840, ScanDirection::Reverse),
        ];
        let notes = vec![
            Note::new(NoteId(0), NoteKind::Tap, 480, 0.5),
            Note::new(NoteId(1), NoteKind::Tap, 960, 0.5),
            Note::new(NoteId(2), NoteKind::Hold, 1440, 0.5).with_hold(240),
            Note::new(NoteId(3), NoteKind::Tap, 2400, 0.5).on_page(1),
        ];
        let events = vec![EventOrder::new(1200), EventOrder::new(3000)];
        Chart::new(timeline, pages, notes, events).unwrap()
    }

    #[test]
    fn test_retime_halves_window() {
        let chart = sample_chart();
        let retimed = chart.retime(960, 0.5).unwrap();

        let ticks: Vec<Tick> = retimed.notes().iter().map(|n| n.tick).collect();
        assert_eq!(ticks, vec![480, 960, 1200, 1920]);
        assert_eq!(retimed.notes()[2].hold_ticks, 120);

        let tempos = retimed.tempo_events();
        assert_eq!(tempos[1].tick, 960);
        assert_eq!(tempos[1].micros_per_beat, 800_000.0);
        assert_eq!(tempos[2].tick, 1440);

        assert_eq!(retimed.pages()[0].end_tick, 1440);
        assert_eq!(retimed.pages()[1].start_tick, 1440);
        assert_eq!(retimed.total_ticks(), 3360);

        let event_ticks: Vec<Tick> = retimed.event_orders().iter().map(|e| e.tick).collect();
        assert_eq!(event_ticks, vec![1080, 2520]);
    }

    #[test]
    fn test_retime_keeps_time_outside_window() {
        let chart = sample_chart();
        let retimed = chart.retime(960, 0.5).unwrap();
        // Before the window nothing moves.
        assert!((chart.tick_to_time(480) - retimed.tick_to_time(480)).abs() < 1e-9);
        // After the window notes keep their absolute time.
        let before = chart.tick_to_time(2400);
        let after = retimed.tick_to_time(1920);
        assert!((before - after).abs() < 1e-6);
    }

    #[test]
    fn test_retime_inverse_restores_chart() {
        let chart = sample_chart();
        let restored = chart.retime(960, 0.5).unwrap().retime(960, 2.0).unwrap();
        assert_eq!(restored, chart);
    }

    #[test]
    fn test_retime_last_segment_uses_chart_end() {
        let chart = sample_chart();
        let retimed = chart.retime(1920, 2.0).unwrap();
        assert_eq!(retimed.notes()[3].tick, 2880);
        assert_eq!(retimed.pages()[1].end_tick, 5760);
        assert_eq!(retimed.pages()[1].start_tick, 1920);
    }

    #[test]
    fn test_retime_rejects_bad_anchor_and_ratio() {
        let chart = sample_chart();
        assert!(matches!(
            chart.retime(1000, 0.5),
            Err(ChartError::InvalidRetimeAnchor(1000))
        ));
        assert!(matches!(
            chart.retime(960, 0.0),
            Err(ChartError::InvalidRetimeRatio(_))
        ));
        assert!(matches!(
            chart.retime(960, f64::INFINITY),
            Err(ChartError::InvalidRetimeRatio(_))
        ));
    }

    #[test]
    fn test_retime_rejects_collapsing_segment() {
        let timeline = TempoTimeline::new(
            480,
            vec![
                TempoEvent::new(0, 500_000.0),
                TempoEvent::new(960, 400_000.0),
                TempoEvent::new(961, 300_000.0),
            ],
        )
        .unwrap();
        let pages = vec![Page::new(0, 1920, ScanDirection::Forward)];
        let chart = Chart::new(timeline, pages, Vec::new(), Vec::new()).unwrap();
        // One tick scaled by 0.4 rounds to zero.
        assert!(matches!(
            chart.retime(960, 0.4),
            Err(ChartError::InvalidRetimeRatio(_))
        ));
        assert!(chart.retime(960, 0.6).is_ok());
    }

    #[test]
    fn test_coalesce_drops_equal_display_bpm() {
        let timeline = TempoTimeline::new(
            480,
            vec![
                TempoEvent::new(0, 500_000.0),
                TempoEvent::new(480, 500_000.4),
                TempoEvent::new(960, 400_000.0),
            ],
        )
        .unwrap();
        let pages = vec![Page::new(0, 1920, ScanDirection::Forward)];
        let chart = Chart::new(timeline, pages, Vec::new(), Vec::new()).unwrap();
        let coalesced = chart.coalesce_tempos().unwrap();
        let ticks: Vec<Tick> = coalesced.tempo_events().iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, 960]);
    }

    #[test]
    fn test_plan_applies_in_order_then_coalesces() {
        let timeline = TempoTimeline::new(
            480,
            vec![TempoEvent::new(0, 500_000.0), TempoEvent::new(960, 250_000.0)],
        )
        .unwrap();
        let pages = vec![Page::new(0, 3840, ScanDirection::Forward)];
        let notes = vec![Note::new(NoteId(0), NoteKind::Tap, 1920, 0.5)];
        let chart = Chart::new(timeline, pages, notes, Vec::new()).unwrap();

        let plan = RetimePlan::from_json(r#"[{"tick": 960, "ratio": 0.5}]"#).unwrap();
        assert_eq!(plan.steps().len(), 1);
        let corrected = plan.apply(&chart).unwrap();

        // The corrected segment now matches the first tempo and is merged.
        assert_eq!(corrected.tempo_events().len(), 1);
        assert_eq!(corrected.notes()[0].tick, 1440);
        assert_eq!(corrected.total_ticks(), 2400);
    }

    #[test]
    fn test_plan_propagates_first_failure() {
        let chart = sample_chart();
        let plan = RetimePlan::new(vec![
            RetimeStep { tick: 960, ratio: 0.5 },
            RetimeStep { tick: 1920, ratio: 2.0 },
        ]);
        // After the first step the old 1920 boundary moved to 1440.
        assert!(matches!(
            plan.apply(&chart),
            Err(ChartError::InvalidRetimeAnchor(1920))
        ));
    }

    #[test]
    fn test_legacy_drift_plan() {
        let plan = RetimePlan::legacy_drift();
        assert_eq!(plan.steps().len(), 3);
        assert_eq!(plan.steps()[1], RetimeStep { tick: 44160, ratio: 2.0 });
    }
}
