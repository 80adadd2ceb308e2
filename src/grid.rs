//! Measure and beat grid lines for the chart timeline.

use crate::chart::{round_tick, Tick};
use crate::error::{ChartError, Result};
use serde::{Deserialize, Serialize};

/// Measure lengths in beats that can be scaled by a power of two.
const METER_BASES: [f64; 8] = [0.25, 0.375, 0.3125, 0.4375, 0.5625, 0.6875, 0.8125, 0.9375];

/// Sixteenth steps per beat line.
const STEPS_PER_BEAT: u32 = 4;

fn is_power_of_two(value: f64) -> bool {
    let rounded = value.round();
    (value - rounded).abs() < 1e-9 && rounded >= 1.0 && (rounded as u64).is_power_of_two()
}

/// Whether a measure of `value` beats can be drawn.
///
/// # Examples
///
/// ```
/// use chartkit::grid::is_supported_meter;
///
/// assert!(is_supported_meter(4.0));
/// assert!(is_supported_meter(3.0));
/// assert!(!is_supported_meter(0.1));
/// ```
pub fn is_supported_meter(value: f64) -> bool {
    value.is_finite()
        && value > 0.0
        && METER_BASES.iter().any(|base| is_power_of_two(value / base))
}

/// From `tick` onwards, one measure lasts `value * time_base` ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureMark {
    pub tick: Tick,
    pub value: f64,
}

impl MeasureMark {
    /// # Errors
    ///
    /// `UnsupportedMeter` if `value` is not a supported measure length.
    pub fn new(tick: Tick, value: f64) -> Result<Self> {
        if !is_supported_meter(value) {
            return Err(ChartError::UnsupportedMeter(value));
        }
        Ok(Self { tick, value })
    }
}

/// Grid line weight, heaviest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridLineKind {
    Measure,
    Beat,
    Sub,
}

/// A horizontal line drawn at `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLine {
    pub tick: Tick,
    pub kind: GridLineKind,
}

impl GridLine {
    fn new(tick: Tick, kind: GridLineKind) -> Self {
        Self { tick, kind }
    }
}

/// Measure grid for a chart of `total_ticks`.
///
/// Each mark starts a section that runs to the next mark (or the chart end)
/// with a measure line at every measure start. A measure line is always
/// drawn at `total_ticks`. Between measure lines a line falls every
/// sixteenth; every fourth one counted from the measure line is a beat line.
///
/// # Errors
///
/// - `MalformedChart` if `time_base` is not positive
/// - `UnsupportedMeter` if any mark carries an unsupported measure length
pub fn measure_grid(
    total_ticks: Tick,
    time_base: i64,
    marks: &[MeasureMark],
) -> Result<Vec<GridLine>> {
    if time_base <= 0 {
        return Err(ChartError::MalformedChart(format!(
            "time base must be positive, got {time_base}"
        )));
    }
    if let Some(bad) = marks.iter().find(|m| !is_supported_meter(m.value)) {
        return Err(ChartError::UnsupportedMeter(bad.value));
    }
    let mut marks = marks.to_vec();
    marks.sort_by_key(|m| m.tick);

    let mut measures: Vec<Tick> = Vec::new();
    for (i, mark) in marks.iter().enumerate() {
        let section_end = marks.get(i + 1).map_or(total_ticks, |next| next.tick);
        let step = time_base as f64 * mark.value;
        measures.extend(
            (0..)
                .map(|n| mark.tick + round_tick(n as f64 * step))
                .take_while(|&tick| tick < section_end),
        );
    }
    if !measures.contains(&total_ticks) {
        measures.push(total_ticks);
    }
    measures.sort_unstable();
    measures.dedup();

    let sub_step = time_base as f64 / STEPS_PER_BEAT as f64;
    let mut lines: Vec<GridLine> = measures
        .iter()
        .map(|&tick| GridLine::new(tick, GridLineKind::Measure))
        .collect();
    for pair in measures.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        lines.extend(
            (1u32..)
                .map(|n| (n, start + round_tick(n as f64 * sub_step)))
                .take_while(|&(_, tick)| tick < end)
                .map(|(n, tick)| {
                    let kind = if n % STEPS_PER_BEAT == 0 {
                        GridLineKind::Beat
                    } else {
                        GridLineKind::Sub
                    };
                    GridLine::new(tick, kind)
                }),
        );
    }

    lines.sort_by_key(|line| (line.tick, line.kind));
    Ok(lines)
}

/// Evenly spaced measure lines at `0, step, 2 * step, ...` below
/// `total_ticks`. Used for legacy charts, one line per page.
pub fn fixed_grid(total_ticks: Tick, step: Tick) -> Vec<GridLine> {
    if step <= 0 {
        return Vec::new();
    }
    (0..total_ticks)
        .step_by(step as usize)
        .map(|tick| GridLine::new(tick, GridLineKind::Measure))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks_of(lines: &[GridLine], kind: GridLineKind) -> Vec<Tick> {
        lines
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.tick)
            .collect()
    }

    #[test]
    fn test_supported_meters() {
        assert!(is_supported_meter(0.25));
        assert!(is_supported_meter(1.0));
        assert!(is_supported_meter(1.5));
        assert!(is_supported_meter(5.0 / 4.0 * 0.5));
        assert!(!is_supported_meter(0.2));
        assert!(!is_supported_meter(-4.0));
        assert!(!is_supported_meter(f64::NAN));
    }

    #[test]
    fn test_measure_mark_validation() {
        assert!(MeasureMark::new(0, 4.0).is_ok());
        assert!(matches!(
            MeasureMark::new(0, 0.1),
            Err(ChartError::UnsupportedMeter(_))
        ));
    }

    #[test]
    fn test_common_time_grid() {
        let marks = [MeasureMark::new(0, 4.0).unwrap()];
        let lines = measure_grid(3840, 480, &marks).unwrap();

        assert_eq!(ticks_of(&lines, GridLineKind::Measure), vec![0, 1920, 3840]);
        assert_eq!(
            ticks_of(&lines, GridLineKind::Beat),
            vec![480, 960, 1440, 2400, 2880, 3360]
        );
        assert_eq!(ticks_of(&lines, GridLineKind::Sub).len(), 24);
        assert!(lines.windows(2).all(|w| w[0].tick <= w[1].tick));
    }

    #[test]
    fn test_meter_change() {
        let marks = [
            MeasureMark::new(1440, 2.0).unwrap(),
            MeasureMark::new(0, 3.0).unwrap(),
        ];
        let lines = measure_grid(2400, 480, &marks).unwrap();
        assert_eq!(ticks_of(&lines, GridLineKind::Measure), vec![0, 1440, 2400]);
    }

    #[test]
    fn test_partial_last_measure() {
        let marks = [MeasureMark::new(0, 4.0).unwrap()];
        let lines = measure_grid(2000, 480, &marks).unwrap();
        assert_eq!(ticks_of(&lines, GridLineKind::Measure), vec![0, 1920, 2000]);
    }

    #[test]
    fn test_rejects_unsupported_mark() {
        let marks = [MeasureMark { tick: 0, value: 0.7 }];
        assert!(matches!(
            measure_grid(1920, 480, &marks),
            Err(ChartError::UnsupportedMeter(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_time_base() {
        let marks = [MeasureMark::new(0, 4.0).unwrap()];
        for time_base in [0, -480] {
            assert!(matches!(
                measure_grid(1920, time_base, &marks),
                Err(ChartError::MalformedChart(_))
            ));
        }
    }

    #[test]
    fn test_fixed_grid() {
        let lines = fixed_grid(3360, 960);
        let ticks: Vec<Tick> = lines.iter().map(|l| l.tick).collect();
        assert_eq!(ticks, vec![0, 960, 1920, 2880]);
        assert!(fixed_grid(3360, 0).is_empty());
    }
}
