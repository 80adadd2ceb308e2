//! Piecewise-constant tempo timeline.
//!
//! Converts between ticks and milliseconds. Segment lookup is a binary
//! search whose ties resolve to the last matching entry, so a tick that sits
//! exactly on a tempo boundary belongs to the segment starting there.

use super::{round_tick, TempoEvent, Tick};
use crate::error::{ChartError, Result};
use tracing::warn;

/// Finds the last item whose key is `<= key`.
///
/// `items` must be sorted ascending by `key_of`. When several consecutive
/// items share the search key, the last of them is returned. A key above the
/// last item yields the last index; a key below the first yields `None`.
///
/// # Examples
///
/// ```
/// use chartkit::chart::search_last_at_or_before;
///
/// let ticks = [0, 480, 480, 960];
/// assert_eq!(search_last_at_or_before(&ticks, 480, |t| *t), Some(2));
/// assert_eq!(search_last_at_or_before(&ticks, 700, |t| *t), Some(2));
/// assert_eq!(search_last_at_or_before(&ticks, 5000, |t| *t), Some(3));
/// assert_eq!(search_last_at_or_before(&ticks, -1, |t| *t), None);
/// ```
pub fn search_last_at_or_before<T, K, F>(items: &[T], key: K, key_of: F) -> Option<usize>
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    items
        .partition_point(|item| key_of(item) <= key)
        .checked_sub(1)
}

/// Sorted tempo events with their derived absolute times.
///
/// Invariants: at least one event, the first at tick 0, ticks strictly
/// ascending, every tempo value finite and positive.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoTimeline {
    time_base: i64,
    events: Vec<TempoEvent>,
}

impl TempoTimeline {
    /// Builds a timeline from tempo events in any order.
    ///
    /// Events are sorted by tick. When two events share a tick the one that
    /// came later in `events` is kept.
    ///
    /// # Errors
    ///
    /// - `MalformedChart` for a non-positive time base or tempo value
    /// - `UncoveredTimeRange` when no event starts at tick 0
    pub fn new(time_base: i64, mut events: Vec<TempoEvent>) -> Result<Self> {
        if time_base <= 0 {
            return Err(ChartError::MalformedChart(format!(
                "time base must be positive, got {}",
                time_base
            )));
        }
        if let Some(bad) = events
            .iter()
            .find(|e| !(e.micros_per_beat.is_finite() && e.micros_per_beat > 0.0))
        {
            return Err(ChartError::MalformedChart(format!(
                "tempo value {} at tick {} is not a positive number",
                bad.micros_per_beat, bad.tick
            )));
        }

        // Stable sort keeps input order among equal ticks, so keeping the
        // last of each run keeps the later event.
        events.sort_by_key(|e| e.tick);
        let before = events.len();
        let mut deduped: Vec<TempoEvent> = Vec::with_capacity(before);
        for event in events {
            match deduped.last_mut() {
                Some(last) if last.tick == event.tick => *last = event,
                _ => deduped.push(event),
            }
        }
        if deduped.len() != before {
            warn!(
                dropped = before - deduped.len(),
                "tempo events with duplicate ticks were dropped"
            );
        }

        match deduped.first() {
            Some(first) if first.tick == 0 => {}
            Some(first) => {
                return Err(ChartError::UncoveredTimeRange(format!(
                    "first tempo event is at tick {}, ticks before it have no tempo",
                    first.tick
                )))
            }
            None => {
                return Err(ChartError::UncoveredTimeRange(
                    "chart has no tempo events".to_string(),
                ))
            }
        }

        let mut timeline = Self {
            time_base,
            events: deduped,
        };
        timeline.derive_times();
        Ok(timeline)
    }

    /// Creates a single-tempo timeline.
    pub fn constant(time_base: i64, micros_per_beat: f64) -> Result<Self> {
        Self::new(time_base, vec![TempoEvent::new(0, micros_per_beat)])
    }

    /// Recomputes every event's absolute time from tick 0 forward.
    fn derive_times(&mut self) {
        let time_base = self.time_base;
        let mut elapsed = 0.0;
        let mut previous: Option<TempoEvent> = None;
        for event in &mut self.events {
            if let Some(prev) = previous {
                elapsed += prev.ms_per_tick(time_base) * (event.tick - prev.tick) as f64;
            }
            event.derived_time_ms = elapsed;
            previous = Some(*event);
        }
    }

    /// Ticks per quarter note.
    pub fn time_base(&self) -> i64 {
        self.time_base
    }

    /// Tempo events in tick order.
    pub fn events(&self) -> &[TempoEvent] {
        &self.events
    }

    /// Index of the segment containing `tick`.
    pub fn segment_at_tick(&self, tick: Tick) -> usize {
        search_last_at_or_before(&self.events, tick, |e| e.tick).unwrap_or(0)
    }

    /// Index of the segment containing the absolute time `time_ms`.
    pub fn segment_at_time(&self, time_ms: f64) -> usize {
        search_last_at_or_before(&self.events, time_ms, |e| e.derived_time_ms).unwrap_or(0)
    }

    /// Index of the event that starts exactly at `tick`, if any.
    pub fn event_index_at(&self, tick: Tick) -> Option<usize> {
        self.events.binary_search_by_key(&tick, |e| e.tick).ok()
    }

    /// Absolute time in milliseconds of `tick`.
    ///
    /// Ticks past the last event extrapolate with the final tempo.
    ///
    /// # Examples
    ///
    /// ```
    /// use chartkit::chart::TempoTimeline;
    ///
    /// let timeline = TempoTimeline::constant(480, 500_000.0).unwrap();
    /// assert!((timeline.tick_to_time(480) - 500.0).abs() < 1e-9);
    /// ```
    pub fn tick_to_time(&self, tick: Tick) -> f64 {
        let segment = &self.events[self.segment_at_tick(tick)];
        segment.derived_time_ms
            + segment.ms_per_tick(self.time_base) * (tick - segment.tick) as f64
    }

    /// Tick at absolute time `time_ms`, rounded to the nearest whole tick.
    pub fn time_to_tick(&self, time_ms: f64) -> Tick {
        let segment = &self.events[self.segment_at_time(time_ms)];
        let elapsed = (time_ms - segment.derived_time_ms) / segment.ms_per_tick(self.time_base);
        segment.tick + round_tick(elapsed)
    }

    /// Tick at which segment `index` ends: the next event, or `total_ticks`
    /// for the final segment.
    pub fn segment_end(&self, index: usize, total_ticks: Tick) -> Tick {
        self.events
            .get(index + 1)
            .map_or(total_ticks, |next| next.tick)
    }

    /// Indices of the segments that overlap `[start, end)`: the one covering
    /// `start` plus every one that begins inside the range.
    pub fn segments_overlapping(&self, start: Tick, end: Tick, total_ticks: Tick) -> Vec<usize> {
        (0..self.events.len())
            .filter(|&i| {
                let event = &self.events[i];
                let seg_end = self.segment_end(i, total_ticks);
                let covers_start = event.tick <= start && seg_end > start;
                let begins_inside = event.tick >= start && event.tick < end;
                covers_start || begins_inside
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tempo_timeline() -> TempoTimeline {
        // 120 BPM for the first 960 ticks, then 240 BPM.
        TempoTimeline::new(
            480,
            vec![TempoEvent::new(960, 250_000.0), TempoEvent::new(0, 500_000.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_search_ties_resolve_to_last() {
        let keys = [0, 100, 100, 100, 200];
        assert_eq!(search_last_at_or_before(&keys, 100, |k| *k), Some(3));
        assert_eq!(search_last_at_or_before(&keys, 0, |k| *k), Some(0));
        assert_eq!(search_last_at_or_before(&keys, 150, |k| *k), Some(3));
        assert_eq!(search_last_at_or_before(&keys, 200, |k| *k), Some(4));
        assert_eq!(search_last_at_or_before(&keys, 999, |k| *k), Some(4));
        assert_eq!(search_last_at_or_before(&keys, -5, |k| *k), None);
        assert_eq!(search_last_at_or_before::<i64, i64, _>(&[], 5, |k| *k), None);
    }

    #[test]
    fn test_derived_times() {
        let timeline = two_tempo_timeline();
        let events = timeline.events();
        assert_eq!(events[0].tick, 0);
        assert_eq!(events[0].derived_time_ms, 0.0);
        assert!((events[1].derived_time_ms - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_to_time_at_120_bpm() {
        let timeline = TempoTimeline::constant(480, 500_000.0).unwrap();
        assert!((timeline.tick_to_time(480) - 500.0).abs() < 1e-9);
        assert!((timeline.tick_to_time(0)).abs() < 1e-9);
    }

    #[test]
    fn test_tick_to_time_across_segments() {
        let timeline = two_tempo_timeline();
        // Boundary tick belongs to the faster segment but times agree.
        assert!((timeline.tick_to_time(960) - 1000.0).abs() < 1e-9);
        assert!((timeline.tick_to_time(1440) - 1250.0).abs() < 1e-9);
        // Extrapolation past the last event uses the final tempo.
        assert!((timeline.tick_to_time(96_000) - (1000.0 + 95_040.0 * 250.0 / 480.0)).abs() < 1e-6);
    }

    #[test]
    fn test_time_to_tick() {
        let timeline = two_tempo_timeline();
        assert_eq!(timeline.time_to_tick(500.0), 480);
        assert_eq!(timeline.time_to_tick(1000.0), 960);
        assert_eq!(timeline.time_to_tick(1250.0), 1440);
        // Before zero extrapolates with the first tempo.
        assert_eq!(timeline.time_to_tick(-500.0), -480);
    }

    #[test]
    fn test_round_trip_within_one_tick() {
        let timeline = TempoTimeline::new(
            480,
            vec![
                TempoEvent::new(0, 461_538.0),
                TempoEvent::new(1000, 333_333.0),
                TempoEvent::new(1777, 612_244.9),
                TempoEvent::new(5000, 410_958.9),
            ],
        )
        .unwrap();
        for tick in (0..=8000).step_by(7) {
            let back = timeline.time_to_tick(timeline.tick_to_time(tick));
            assert!((back - tick).abs() <= 1, "tick {} came back as {}", tick, back);
        }
    }

    #[test]
    fn test_duplicate_ticks_keep_later_event() {
        let timeline = TempoTimeline::new(
            480,
            vec![
                TempoEvent::new(0, 500_000.0),
                TempoEvent::new(480, 400_000.0),
                TempoEvent::new(480, 300_000.0),
            ],
        )
        .unwrap();
        assert_eq!(timeline.events().len(), 2);
        assert_eq!(timeline.events()[1].micros_per_beat, 300_000.0);
    }

    #[test]
    fn test_rejects_missing_zero_tempo() {
        let result = TempoTimeline::new(480, vec![TempoEvent::new(10, 500_000.0)]);
        assert!(matches!(result, Err(ChartError::UncoveredTimeRange(_))));
        let result = TempoTimeline::new(480, vec![]);
        assert!(matches!(result, Err(ChartError::UncoveredTimeRange(_))));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            TempoTimeline::constant(0, 500_000.0),
            Err(ChartError::MalformedChart(_))
        ));
        assert!(matches!(
            TempoTimeline::constant(480, 0.0),
            Err(ChartError::MalformedChart(_))
        ));
        assert!(matches!(
            TempoTimeline::constant(480, f64::NAN),
            Err(ChartError::MalformedChart(_))
        ));
    }

    #[test]
    fn test_segments_overlapping() {
        let timeline = two_tempo_timeline();
        assert_eq!(timeline.segments_overlapping(0, 960, 3840), vec![0]);
        assert_eq!(timeline.segments_overlapping(480, 1440, 3840), vec![0, 1]);
        assert_eq!(timeline.segments_overlapping(960, 1920, 3840), vec![1]);
        assert_eq!(timeline.segments_overlapping(3840, 3840, 3840), Vec::<usize>::new());
        assert_eq!(timeline.segment_end(1, 3840), 3840);
    }
}
