//! chartkit - Timing engine for scan-line rhythm game charts.
//!
//! This library provides the chart model and the transforms built on it:
//! legacy text conversion, tick/time mapping, retiming, rhythm
//! classification, page geometry and statistics.

pub mod chart;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod rhythm;
pub mod stats;

// Re-export commonly used types
pub use chart::{
    convert_legacy, Chart, LegacyConversion, Note, NoteId, NoteKind, Page, RetimePlan, TempoEvent,
    TempoTimeline, Tick,
};
pub use error::{ChartError, Result};
pub use geometry::{compile_pages, split_long_holds, PageGeometry, ScanLineSpeed};
pub use rhythm::{classify_chart, RhythmEntry, Subdivision};
pub use stats::ChartStatistics;
