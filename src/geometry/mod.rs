//! Per-page scan line geometry.
//!
//! Each page is compiled into the scan line speeds it shows. Speed is the
//! tempo scaled by how long the page is relative to the first one and by the
//! fraction of the play area the scan line travels.

mod hold;
mod layout;

pub use hold::{split_long_holds, HoldSegment};
pub use layout::{note_position, notes_on_page, page_layout, NotePosition, PageBand};

use crate::chart::{micros_to_bpm, Chart, Page, ScanDirection, Tick};
use crate::error::{ChartError, Result};
use serde::Serialize;
use tracing::debug;

/// Scan line speed shown for a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanLineSpeed {
    /// One tempo covers the whole page.
    Single(f64),
    /// Several tempos change within the page.
    Range { max: f64, min: f64 },
}

/// Speed in effect from `tick` on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedPoint {
    pub tick: Tick,
    pub speed: f64,
}

/// Compiled geometry of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageGeometry {
    pub index: usize,
    pub start_tick: Tick,
    pub end_tick: Tick,
    pub direction: ScanDirection,
    pub amplitude: f64,
    pub center: f64,
    /// Page length relative to the first page, as a speed multiplier.
    pub length_ratio: f64,
    /// Page duration differs from the previous page.
    pub length_changed: bool,
    /// Amplitude differs from the previous page.
    pub scale_changed: bool,
    pub speed: ScanLineSpeed,
    /// One point per tempo segment overlapping the page, in tick order.
    pub speed_points: Vec<SpeedPoint>,
}

/// A change in scan line speed relative to the speed shown just before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedChange {
    pub page_index: usize,
    pub tick: Tick,
    pub speed: f64,
    pub faster: bool,
}

fn unsupported(page: usize, reason: impl Into<String>) -> ChartError {
    ChartError::UnsupportedPageGeometry {
        page,
        reason: reason.into(),
    }
}

fn validate_page(index: usize, page: &Page) -> Result<()> {
    let function = &page.position_function;
    if function.kind != 0 {
        return Err(unsupported(
            index,
            format!("position function type {}", function.kind),
        ));
    }
    if !(0.0..=1.0).contains(&function.amplitude) {
        return Err(unsupported(
            index,
            format!("amplitude {} outside [0, 1]", function.amplitude),
        ));
    }
    if !(-1.0..=1.0).contains(&function.center) {
        return Err(unsupported(
            index,
            format!("center {} outside [-1, 1]", function.center),
        ));
    }
    if page.duration_ticks() <= 0 {
        return Err(unsupported(index, "page has no duration"));
    }
    Ok(())
}

/// Compiles the geometry of every page of a chart.
///
/// # Errors
///
/// - `UnsupportedPageGeometry` for a position function other than the
///   identity kind, out-of-range amplitude or center, or an empty page
/// - `UncoveredTimeRange` if no tempo segment overlaps a page
pub fn compile_pages(chart: &Chart) -> Result<Vec<PageGeometry>> {
    let pages = chart.pages();
    let Some(first) = pages.first() else {
        return Ok(Vec::new());
    };
    validate_page(0, first)?;

    let time_base = chart.time_base() as f64;
    let mut length_ratio = 2.0 / (first.duration_ticks() as f64 / time_base);
    let mut previous_duration = first.duration_ticks();
    let mut previous_amplitude = first.position_function.amplitude;
    let mut compiled = Vec::with_capacity(pages.len());

    for (index, page) in pages.iter().enumerate() {
        validate_page(index, page)?;

        let duration = page.duration_ticks();
        let length_changed = duration != previous_duration;
        if length_changed {
            length_ratio *= previous_duration as f64 / duration as f64;
        }
        let amplitude = page.position_function.amplitude;
        let scale_changed = amplitude != previous_amplitude;
        previous_duration = duration;
        previous_amplitude = amplitude;

        let speed_points = speed_points(chart, page, length_ratio * amplitude);
        let speed = match speed_points.as_slice() {
            [] => {
                return Err(ChartError::UncoveredTimeRange(format!(
                    "no tempo covers page {} [{}, {})",
                    index, page.start_tick, page.end_tick
                )))
            }
            [only] => ScanLineSpeed::Single(only.speed),
            points => {
                let speeds = points.iter().map(|p| p.speed);
                ScanLineSpeed::Range {
                    max: speeds.clone().fold(f64::MIN, f64::max),
                    min: speeds.fold(f64::MAX, f64::min),
                }
            }
        };

        compiled.push(PageGeometry {
            index,
            start_tick: page.start_tick,
            end_tick: page.end_tick,
            direction: page.scan_direction,
            amplitude,
            center: page.position_function.center,
            length_ratio,
            length_changed,
            scale_changed,
            speed,
            speed_points,
        });
    }

    debug!(pages = compiled.len(), "compiled page geometry");
    Ok(compiled)
}

fn speed_points(chart: &Chart, page: &Page, multiplier: f64) -> Vec<SpeedPoint> {
    let timeline = chart.timeline();
    timeline
        .segments_overlapping(page.start_tick, page.end_tick, chart.total_ticks())
        .into_iter()
        .map(|i| {
            let event = &timeline.events()[i];
            SpeedPoint {
                tick: event.tick.max(page.start_tick),
                speed: micros_to_bpm(event.micros_per_beat) * multiplier,
            }
        })
        .collect()
}

/// Lists every point where the scan line speed differs from the speed shown
/// before it, across all pages in order. The first page's opening speed
/// counts as a change from rest.
pub fn speed_changes(pages: &[PageGeometry]) -> Vec<SpeedChange> {
    let mut previous = 0.0;
    let mut changes = Vec::new();
    for page in pages {
        for point in &page.speed_points {
            if point.speed != previous {
                changes.push(SpeedChange {
                    page_index: page.index,
                    tick: point.tick,
                    speed: point.speed,
                    faster: point.speed > previous,
                });
            }
            previous = point.speed;
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{PositionFunction, TempoEvent, TempoTimeline};

    fn chart(pages: Vec<Page>, tempos: Vec<TempoEvent>) -> Chart {
        let timeline = TempoTimeline::new(480, tempos).unwrap();
        Chart::new(timeline, pages, Vec::new(), Vec::new()).unwrap()
    }

    fn shifted(amplitude: f64, center: f64) -> PositionFunction {
        PositionFunction {
            kind: 0,
            amplitude,
            center,
        }
    }

    #[test]
    fn test_single_tempo_page() {
        let chart = chart(
            vec![Page::new(0, 960, ScanDirection::Forward)],
            vec![TempoEvent::new(0, 500_000.0)],
        );
        let pages = compile_pages(&chart).unwrap();
        assert_eq!(pages.len(), 1);
        // Two beats per page gives a ratio of one.
        assert_eq!(pages[0].length_ratio, 1.0);
        assert_eq!(pages[0].speed, ScanLineSpeed::Single(120.0));
        assert!(!pages[0].length_changed);
        assert!(!pages[0].scale_changed);
    }

    #[test]
    fn test_tempo_change_inside_page_gives_range() {
        let chart = chart(
            vec![
                Page::new(0, 960, ScanDirection::Forward),
                Page::new(960, 1920, ScanDirection::Reverse),
            ],
            vec![TempoEvent::new(0, 500_000.0), TempoEvent::new(1440, 250_000.0)],
        );
        let pages = compile_pages(&chart).unwrap();
        assert_eq!(pages[0].speed, ScanLineSpeed::Single(120.0));
        assert_eq!(
            pages[1].speed,
            ScanLineSpeed::Range {
                max: 240.0,
                min: 120.0
            }
        );
        // The segment started before the page is reported at the page start.
        assert_eq!(pages[1].speed_points[0].tick, 960);
        assert_eq!(pages[1].speed_points[1].tick, 1440);
    }

    #[test]
    fn test_length_ratio_compounds_on_change() {
        let chart = chart(
            vec![
                Page::new(0, 960, ScanDirection::Forward),
                Page::new(960, 1440, ScanDirection::Reverse),
                Page::new(1440, 1920, ScanDirection::Forward),
            ],
            vec![TempoEvent::new(0, 500_000.0)],
        );
        let pages = compile_pages(&chart).unwrap();
        assert_eq!(pages[1].length_ratio, 2.0);
        assert!(pages[1].length_changed);
        assert_eq!(pages[2].length_ratio, 2.0);
        assert!(!pages[2].length_changed);
        assert_eq!(pages[1].speed, ScanLineSpeed::Single(240.0));
    }

    #[test]
    fn test_amplitude_scales_speed() {
        let chart = chart(
            vec![
                Page::new(0, 960, ScanDirection::Forward),
                Page::new(960, 1920, ScanDirection::Reverse).with_position(shifted(0.5, 0.2)),
            ],
            vec![TempoEvent::new(0, 500_000.0)],
        );
        let pages = compile_pages(&chart).unwrap();
        assert!(pages[1].scale_changed);
        assert_eq!(pages[1].speed, ScanLineSpeed::Single(60.0));
    }

    #[test]
    fn test_rejects_unsupported_geometry() {
        let bad_amplitude = chart(
            vec![Page::new(0, 960, ScanDirection::Forward).with_position(shifted(1.5, 0.0))],
            vec![TempoEvent::new(0, 500_000.0)],
        );
        assert!(matches!(
            compile_pages(&bad_amplitude),
            Err(ChartError::UnsupportedPageGeometry { page: 0, .. })
        ));

        let bad_kind = chart(
            vec![
                Page::new(0, 960, ScanDirection::Forward),
                Page::new(960, 1920, ScanDirection::Forward).with_position(PositionFunction {
                    kind: 1,
                    amplitude: 1.0,
                    center: 0.0,
                }),
            ],
            vec![TempoEvent::new(0, 500_000.0)],
        );
        assert!(matches!(
            compile_pages(&bad_kind),
            Err(ChartError::UnsupportedPageGeometry { page: 1, .. })
        ));

        let bad_center = chart(
            vec![Page::new(0, 960, ScanDirection::Forward).with_position(shifted(1.0, -1.5))],
            vec![TempoEvent::new(0, 500_000.0)],
        );
        assert!(compile_pages(&bad_center).is_err());
    }

    #[test]
    fn test_gap_fails_before_geometry() {
        let timeline = TempoTimeline::constant(480, 500_000.0).unwrap();
        let pages = vec![
            Page::new(0, 960, ScanDirection::Forward),
            Page::new(1000, 1920, ScanDirection::Reverse),
        ];
        let result = Chart::new(timeline, pages, Vec::new(), Vec::new());
        assert!(matches!(result, Err(ChartError::UncoveredTimeRange(_))));
    }

    #[test]
    fn test_speed_changes() {
        let chart = chart(
            vec![
                Page::new(0, 960, ScanDirection::Forward),
                Page::new(960, 1920, ScanDirection::Reverse),
                Page::new(1920, 2880, ScanDirection::Forward),
            ],
            vec![
                TempoEvent::new(0, 500_000.0),
                TempoEvent::new(1440, 250_000.0),
                TempoEvent::new(1920, 500_000.0),
            ],
        );
        let pages = compile_pages(&chart).unwrap();
        let changes = speed_changes(&pages);
        let summary: Vec<(Tick, bool)> = changes.iter().map(|c| (c.tick, c.faster)).collect();
        assert_eq!(summary, vec![(0, true), (1440, true), (1920, false)]);
    }
}
