//! Legacy chart import.
//!
//! Converts the line-oriented, seconds-based legacy chart format into a
//! tick-domain [`Chart`]. The legacy format carries no tempo, so one is
//! estimated from the page size.
//!
//! # Format
//!
//! ```text
//! PAGE_SHIFT <seconds>
//! PAGE_SIZE <seconds>
//! NOTE <index> <time> <x> <hold>
//! LINK <index> <index> ...
//! ```
//!
//! Characters other than ASCII letters, digits, `_` and `.` are treated as
//! whitespace, so signs are dropped. Lines starting with any other keyword
//! are skipped.
//!
//! # Limitations
//!
//! - The tempo estimate applies one doubling and one halving at most; charts
//!   whose real tempo is further outside 100-250 BPM come out at a multiple
//!   of it
//! - Dragged-over children of a `LINK` are dropped, only the head is kept

use super::{
    bpm_to_micros, round_tick, Chart, Note, NoteId, NoteKind, Page, ScanDirection, TempoTimeline,
    LEGACY_MAX_BPM, LEGACY_MIN_BPM, LEGACY_PAGE_PADDING_TICKS, LEGACY_TIME_BASE,
};
use crate::error::{ChartError, Result};
use std::collections::HashSet;
use tracing::{debug, info};

/// A `NOTE` directive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyNote {
    pub index: i64,
    /// Start time in seconds.
    pub time: f64,
    pub x: f64,
    /// Hold length in seconds.
    pub hold_time: f64,
}

/// Everything the converter needs from a legacy file, collected in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyChart {
    /// Offset in seconds added to every note time.
    pub page_shift: f64,
    /// Page length in seconds.
    pub page_size: f64,
    /// Notes sorted by index.
    pub notes: Vec<LegacyNote>,
    /// Drag chains, each sorted ascending.
    pub links: Vec<Vec<i64>>,
}

/// Result of converting a legacy chart.
#[derive(Debug, Clone)]
pub struct LegacyConversion {
    pub chart: Chart,
    /// Estimated tempo in beats per minute.
    pub bpm: f64,
    /// The legacy page size expressed in output ticks, for callers drawing
    /// the legacy fixed page grid.
    pub page_size_ticks: f64,
}

/// Directive values accumulated while scanning lines.
#[derive(Debug, Default)]
struct Directives {
    page_shift: Option<f64>,
    page_size: Option<f64>,
    notes: Vec<LegacyNote>,
    links: Vec<Vec<i64>>,
}

/// Replaces every character outside `[A-Za-z0-9_.]` with a space.
fn sanitize(line: &str) -> String {
    line.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect()
}

fn malformed(line_no: usize, message: impl std::fmt::Display) -> ChartError {
    ChartError::MalformedChart(format!("line {}: {}", line_no, message))
}

fn parse_float(tokens: &[&str], pos: usize, line_no: usize, what: &str) -> Result<f64> {
    let token = tokens
        .get(pos)
        .ok_or_else(|| malformed(line_no, format!("missing {}", what)))?;
    token
        .parse::<f64>()
        .map_err(|_| malformed(line_no, format!("{} '{}' is not a number", what, token)))
}

fn parse_index(token: &str, line_no: usize) -> Result<i64> {
    token
        .parse::<i64>()
        .map_err(|_| malformed(line_no, format!("note index '{}' is not an integer", token)))
}

impl Directives {
    fn absorb(mut self, (line_no, line): (usize, &str)) -> Result<Self> {
        let sanitized = sanitize(line);
        let tokens: Vec<&str> = sanitized.split_whitespace().collect();
        let Some((&keyword, _)) = tokens.split_first() else {
            return Ok(self);
        };

        match keyword {
            "PAGE_SHIFT" => {
                self.page_shift = Some(parse_float(&tokens, 1, line_no, "page shift")?);
            }
            "PAGE_SIZE" => {
                self.page_size = Some(parse_float(&tokens, 1, line_no, "page size")?);
            }
            "NOTE" => {
                let index_token = tokens
                    .get(1)
                    .ok_or_else(|| malformed(line_no, "missing note index"))?;
                self.notes.push(LegacyNote {
                    index: parse_index(index_token, line_no)?,
                    time: parse_float(&tokens, 2, line_no, "note time")?,
                    x: parse_float(&tokens, 3, line_no, "note position")?,
                    hold_time: parse_float(&tokens, 4, line_no, "hold time")?,
                });
            }
            "LINK" => {
                let mut chain = tokens[1..]
                    .iter()
                    .map(|t| parse_index(t, line_no))
                    .collect::<Result<Vec<_>>>()?;
                chain.sort_unstable();
                self.links.push(chain);
            }
            _ => {}
        }
        Ok(self)
    }
}

/// Parses legacy chart text into its directives.
///
/// # Errors
///
/// `MalformedChart` if a directive has missing or non-numeric arguments,
/// if `PAGE_SIZE` is absent or not positive, or if there are no notes.
pub fn parse_legacy(text: &str) -> Result<LegacyChart> {
    let directives = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .try_fold(Directives::default(), Directives::absorb)?;

    let Directives {
        page_shift,
        page_size,
        mut notes,
        links,
    } = directives;

    if notes.is_empty() {
        return Err(ChartError::MalformedChart(
            "legacy chart contains no NOTE entries".to_string(),
        ));
    }
    let page_size = page_size.ok_or_else(|| {
        ChartError::MalformedChart("legacy chart has no PAGE_SIZE".to_string())
    })?;
    if !(page_size.is_finite() && page_size > 0.0) {
        return Err(ChartError::MalformedChart(format!(
            "page size {} is not positive",
            page_size
        )));
    }

    notes.sort_by_key(|n| n.index);

    Ok(LegacyChart {
        page_shift: page_shift.unwrap_or(0.0),
        page_size,
        notes,
        links,
    })
}

impl LegacyChart {
    /// Estimates the tempo from the legacy page size.
    ///
    /// Two beats per page, then one doubling if below 100 BPM and one halving
    /// if above 250 BPM.
    ///
    /// # Examples
    ///
    /// ```
    /// use chartkit::chart::LegacyChart;
    ///
    /// assert_eq!(LegacyChart::estimate_bpm(0.5), 240.0);
    /// assert_eq!(LegacyChart::estimate_bpm(2.0), 120.0);
    /// ```
    pub fn estimate_bpm(page_size: f64) -> f64 {
        let mut bpm = 60e6 / (page_size * 1e6) * 2.0;
        if bpm < LEGACY_MIN_BPM {
            bpm *= 2.0;
        }
        if bpm > LEGACY_MAX_BPM {
            bpm /= 2.0;
        }
        bpm
    }

    /// Converts seconds to (fractional) ticks at `bpm`.
    pub fn sec_to_tick(seconds: f64, bpm: f64) -> f64 {
        let elapsed_beats = seconds / (60.0 / bpm);
        elapsed_beats * LEGACY_TIME_BASE as f64
    }
}

/// Converts legacy chart text into a tick-domain chart.
///
/// # Arguments
///
/// * `text` - Contents of a legacy chart file
///
/// # Errors
///
/// - `MalformedChart` for unparsable input (see [`parse_legacy`])
/// - `InvalidNoteReference` if a `LINK` names an index with no `NOTE`
///
/// # Examples
///
/// ```
/// use chartkit::chart::convert_legacy;
///
/// let converted = convert_legacy("PAGE_SIZE 0.5\nNOTE 0 1.0 0.5 0.0\n").unwrap();
/// assert_eq!(converted.bpm, 240.0);
/// assert_eq!(converted.chart.notes()[0].tick, 1920);
/// ```
pub fn convert_legacy(text: &str) -> Result<LegacyConversion> {
    let legacy = parse_legacy(text)?;
    let bpm = LegacyChart::estimate_bpm(legacy.page_size);
    let to_ticks = |seconds: f64| LegacyChart::sec_to_tick(seconds, bpm);
    debug!(page_size = legacy.page_size, bpm, "estimated legacy tempo");

    // Highest index, not latest time: the page is sized from the last entry.
    let last = legacy.notes[legacy.notes.len() - 1];
    let end_tick = to_ticks(last.time + last.hold_time).ceil() as i64 + LEGACY_PAGE_PADDING_TICKS;

    let known: HashSet<i64> = legacy.notes.iter().map(|n| n.index).collect();
    let mut absorbed: HashSet<i64> = HashSet::new();
    for chain in &legacy.links {
        let Some((&head, children)) = chain.split_first() else {
            continue;
        };
        for &index in chain {
            if !known.contains(&index) {
                return Err(ChartError::InvalidNoteReference {
                    from: head,
                    target: index,
                });
            }
        }
        absorbed.extend(children.iter().copied());
    }

    let notes: Vec<Note> = legacy
        .notes
        .iter()
        .filter(|n| !absorbed.contains(&n.index))
        .enumerate()
        .map(|(id, n)| {
            let kind = if n.hold_time != 0.0 {
                NoteKind::Hold
            } else {
                NoteKind::Tap
            };
            Note::new(
                NoteId(id as i64),
                kind,
                round_tick(to_ticks(n.time + legacy.page_shift)),
                n.x,
            )
            .with_hold(round_tick(to_ticks(n.hold_time)))
        })
        .collect();

    let timeline = TempoTimeline::constant(LEGACY_TIME_BASE, bpm_to_micros(bpm))?;
    let pages = vec![Page::new(0, end_tick, ScanDirection::Forward)];
    let chart = Chart::new(timeline, pages, notes, Vec::new())?;

    info!(
        bpm,
        notes = chart.notes().len(),
        absorbed = absorbed.len(),
        total_ticks = chart.total_ticks(),
        "converted legacy chart"
    );

    Ok(LegacyConversion {
        chart,
        bpm,
        page_size_ticks: to_ticks(legacy.page_size),
    })
}
