//! The chart aggregate.
//!
//! A chart owns its tempo timeline, pages, notes and event orders. It is
//! validated once when built and never mutated afterwards; transformations
//! such as retiming return a new chart.

use super::schema::{ChartFile, NoteRecord, PageRecord, PositionFunctionRecord, TempoRecord};
use super::{
    EventOrder, Note, NoteId, NoteKind, Page, PositionFunction, ScanDirection, TempoEvent,
    TempoTimeline, Tick,
};
use crate::error::{ChartError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A complete, validated chart.
///
/// Invariants held by every instance:
/// - pages are contiguous and cover `[0, total_ticks]`
/// - the tempo timeline starts at tick 0 and is strictly ascending
/// - note ids are unique, every note's page index exists, and every drag
///   chain link points at an existing note
/// - `previous_id` on each note is exactly the reverse of the drag chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChartFile", into = "ChartFile")]
pub struct Chart {
    format_version: i64,
    start_offset_time: f64,
    timeline: TempoTimeline,
    pages: Vec<Page>,
    notes: Vec<Note>,
    event_orders: Vec<EventOrder>,
    /// Arena index of every note by id.
    note_index: HashMap<NoteId, usize>,
}

impl Chart {
    /// Builds and validates a chart.
    ///
    /// Pages with a negative `start_tick` inherit the previous page's end
    /// (0 for the first page). Any `previous_id` already present on the notes
    /// is discarded and re-derived from the drag chains.
    ///
    /// # Errors
    ///
    /// - `UncoveredTimeRange` if the pages leave a gap, overlap, or do not
    ///   start at tick 0
    /// - `MalformedChart` for duplicate note ids or a page index out of range
    /// - `InvalidNoteReference` if a drag chain points at a missing note
    pub fn new(
        timeline: TempoTimeline,
        pages: Vec<Page>,
        notes: Vec<Note>,
        event_orders: Vec<EventOrder>,
    ) -> Result<Self> {
        let pages = normalize_pages(pages)?;
        let (notes, note_index) = link_notes(notes, pages.len())?;
        Ok(Self {
            format_version: 0,
            start_offset_time: 0.0,
            timeline,
            pages,
            notes,
            event_orders,
            note_index,
        })
    }

    /// Sets the passthrough header fields.
    pub fn with_header(mut self, format_version: i64, start_offset_time: f64) -> Self {
        self.format_version = format_version;
        self.start_offset_time = start_offset_time;
        self
    }

    /// Ticks per quarter note.
    pub fn time_base(&self) -> i64 {
        self.timeline.time_base()
    }

    /// Passthrough format version.
    pub fn format_version(&self) -> i64 {
        self.format_version
    }

    /// Passthrough start offset.
    pub fn start_offset_time(&self) -> f64 {
        self.start_offset_time
    }

    /// The tempo timeline.
    pub fn timeline(&self) -> &TempoTimeline {
        &self.timeline
    }

    /// Tempo events in tick order.
    pub fn tempo_events(&self) -> &[TempoEvent] {
        self.timeline.events()
    }

    /// Pages in order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Notes in file order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Event orders in file order.
    pub fn event_orders(&self) -> &[EventOrder] {
        &self.event_orders
    }

    /// End of the last page.
    pub fn total_ticks(&self) -> Tick {
        self.pages.last().map_or(0, |p| p.end_tick)
    }

    /// Absolute time of `tick` in milliseconds.
    pub fn tick_to_time(&self, tick: Tick) -> f64 {
        self.timeline.tick_to_time(tick)
    }

    /// Tick at absolute time `time_ms`.
    pub fn time_to_tick(&self, time_ms: f64) -> Tick {
        self.timeline.time_to_tick(time_ms)
    }

    /// Looks up a note by id.
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.note_index.get(&id).map(|&i| &self.notes[i])
    }

    /// Next note in `note`'s drag chain.
    pub fn next_in_chain(&self, note: &Note) -> Option<&Note> {
        if !note.kind.is_drag_family() {
            return None;
        }
        note.next_id.and_then(|id| self.note(id))
    }

    /// Previous note in `note`'s drag chain.
    pub fn previous_in_chain(&self, note: &Note) -> Option<&Note> {
        note.previous_id.and_then(|id| self.note(id))
    }

    /// Follows the drag chain starting at `head`, head included.
    ///
    /// Stops if the chain loops back on itself.
    pub fn drag_chain(&self, head: NoteId) -> Vec<&Note> {
        let mut chain: Vec<&Note> = Vec::new();
        let mut current = self.note(head);
        while let Some(note) = current {
            if chain.iter().any(|n| n.id == note.id) {
                break;
            }
            chain.push(note);
            current = self.next_in_chain(note);
        }
        chain
    }

    /// Builds a sibling chart from transformed parts, keeping the header.
    pub(super) fn rebuild(
        &self,
        timeline: TempoTimeline,
        pages: Vec<Page>,
        notes: Vec<Note>,
        event_orders: Vec<EventOrder>,
    ) -> Result<Self> {
        Ok(Self::new(timeline, pages, notes, event_orders)?
            .with_header(self.format_version, self.start_offset_time))
    }

    /// Serializes the chart to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a chart from JSON.
    ///
    /// Unlike going through `serde_json::from_str::<Chart>` directly, this
    /// keeps the specific validation error kind.
    ///
    /// # Errors
    ///
    /// `MalformedChart` for JSON that does not match the schema, otherwise
    /// any validation error of [`Chart::new`].
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ChartFile = serde_json::from_str(json)?;
        Self::try_from(file)
    }

    /// Saves the chart to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Loads a chart from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Resolves inherited page starts and checks contiguity.
fn normalize_pages(mut pages: Vec<Page>) -> Result<Vec<Page>> {
    if pages.is_empty() {
        return Err(ChartError::UncoveredTimeRange(
            "chart has no pages".to_string(),
        ));
    }

    let mut previous_end: Tick = 0;
    for (i, page) in pages.iter_mut().enumerate() {
        if page.start_tick < 0 {
            page.start_tick = previous_end;
        }
        if page.start_tick != previous_end {
            return Err(ChartError::UncoveredTimeRange(format!(
                "page {} starts at tick {} but the previous page ends at {}",
                i, page.start_tick, previous_end
            )));
        }
        if page.end_tick < page.start_tick {
            return Err(ChartError::UncoveredTimeRange(format!(
                "page {} ends at tick {} before it starts at {}",
                i, page.end_tick, page.start_tick
            )));
        }
        previous_end = page.end_tick;
    }
    Ok(pages)
}

/// Indexes notes by id and derives the reverse drag links.
fn link_notes(
    mut notes: Vec<Note>,
    page_count: usize,
) -> Result<(Vec<Note>, HashMap<NoteId, usize>)> {
    let mut index = HashMap::with_capacity(notes.len());
    for (i, note) in notes.iter().enumerate() {
        if index.insert(note.id, i).is_some() {
            return Err(ChartError::MalformedChart(format!(
                "duplicate note id {}",
                note.id.as_i64()
            )));
        }
        if note.page_index >= page_count {
            return Err(ChartError::MalformedChart(format!(
                "note {} is on page {} but the chart has {} pages",
                note.id.as_i64(),
                note.page_index,
                page_count
            )));
        }
        if !(0.0..=1.0).contains(&note.x) {
            return Err(ChartError::MalformedChart(format!(
                "note {} has x {} outside [0, 1]",
                note.id.as_i64(),
                note.x
            )));
        }
        if note.hold_ticks < 0 {
            return Err(ChartError::MalformedChart(format!(
                "note {} has negative hold {}",
                note.id.as_i64(),
                note.hold_ticks
            )));
        }
    }

    for note in &mut notes {
        note.previous_id = None;
    }

    let mut reverse_links: Vec<(usize, NoteId)> = Vec::new();
    for note in &notes {
        if !note.kind.is_drag_family() {
            continue;
        }
        if let Some(next) = note.next_id {
            let &target = index.get(&next).ok_or(ChartError::InvalidNoteReference {
                from: note.id.as_i64(),
                target: next.as_i64(),
            })?;
            reverse_links.push((target, note.id));
        }
    }
    for (target, previous) in reverse_links {
        notes[target].previous_id = Some(previous);
    }

    Ok((notes, index))
}

impl TryFrom<ChartFile> for Chart {
    type Error = ChartError;

    fn try_from(file: ChartFile) -> Result<Self> {
        let tempos = file
            .tempo_list
            .iter()
            .map(|t| TempoEvent::new(t.tick, t.value))
            .collect();
        let timeline = TempoTimeline::new(file.time_base, tempos)?;

        let pages = file
            .page_list
            .iter()
            .enumerate()
            .map(|(i, record)| page_from_record(i, record))
            .collect::<Result<Vec<_>>>()?;

        let notes = file
            .note_list
            .iter()
            .map(note_from_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(Chart::new(timeline, pages, notes, file.event_order_list)?
            .with_header(file.format_version, file.start_offset_time))
    }
}

fn page_from_record(index: usize, record: &PageRecord) -> Result<Page> {
    let scan_direction = ScanDirection::from_code(record.scan_line_direction).ok_or_else(|| {
        ChartError::UnsupportedPageGeometry {
            page: index,
            reason: format!("scan direction {}", record.scan_line_direction),
        }
    })?;
    let page = Page::new(record.start_tick, record.end_tick, scan_direction);
    match &record.position_function {
        None => Ok(page),
        Some(function) => match function.arguments.as_slice() {
            [amplitude, center, ..] => Ok(page.with_position(PositionFunction {
                kind: function.kind,
                amplitude: *amplitude,
                center: *center,
            })),
            _ => Err(ChartError::UnsupportedPageGeometry {
                page: index,
                reason: format!(
                    "position function needs 2 arguments, got {}",
                    function.arguments.len()
                ),
            }),
        },
    }
}

fn note_from_record(record: &NoteRecord) -> Result<Note> {
    let page_index = usize::try_from(record.page_index).map_err(|_| {
        ChartError::MalformedChart(format!(
            "note {} has negative page index {}",
            record.id, record.page_index
        ))
    })?;
    Ok(Note {
        id: NoteId(record.id),
        tick: record.tick,
        x: record.x,
        hold_ticks: record.hold_tick,
        kind: NoteKind::from_code(record.kind)?,
        next_id: (record.next_id > 0).then_some(NoteId(record.next_id)),
        previous_id: None,
        page_index,
        is_forward: record.is_forward,
        has_sibling: record.has_sibling,
    })
}

impl From<Chart> for ChartFile {
    fn from(chart: Chart) -> Self {
        ChartFile {
            format_version: chart.format_version,
            start_offset_time: chart.start_offset_time,
            time_base: chart.time_base(),
            page_list: chart
                .pages
                .iter()
                .map(|page| PageRecord {
                    start_tick: page.start_tick,
                    end_tick: page.end_tick,
                    scan_line_direction: page.scan_direction.code(),
                    position_function: page.explicit_position.then(|| PositionFunctionRecord {
                        kind: page.position_function.kind,
                        arguments: vec![
                            page.position_function.amplitude,
                            page.position_function.center,
                        ],
                    }),
                })
                .collect(),
            tempo_list: chart
                .tempo_events()
                .iter()
                .map(|t| TempoRecord {
                    tick: t.tick,
                    value: t.micros_per_beat,
                })
                .collect(),
            event_order_list: chart.event_orders,
            note_list: chart
                .notes
                .iter()
                .map(|note| NoteRecord {
                    id: note.id.as_i64(),
                    tick: note.tick,
                    x: note.x,
                    kind: note.kind.code(),
                    hold_tick: note.hold_ticks,
                    next_id: note.next_id.map_or(0, |id| id.as_i64()),
                    is_forward: note.is_forward,
                    page_index: note.page_index as i64,
                    has_sibling: note.has_sibling,
                })
                .collect(),
        }
    }
}
