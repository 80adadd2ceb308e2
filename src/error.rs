//! Error type shared by every stage of the chart pipeline.
//!
//! All failures are raised at the point of detection and returned to the
//! caller; nothing is retried internally and no partially built chart is
//! ever handed out.

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, ChartError>;

/// Errors produced while building, transforming or analysing a chart.
#[derive(Debug, Error)]
pub enum ChartError {
    /// The input could not be interpreted as a chart at all.
    #[error("malformed chart: {0}")]
    MalformedChart(String),

    /// A page uses a position function, amplitude, center or scan direction
    /// that the geometry compiler cannot represent.
    #[error("unsupported page geometry on page {page}: {reason}")]
    UnsupportedPageGeometry { page: usize, reason: String },

    /// A tick range is not covered by the page list or by any tempo segment.
    #[error("uncovered time range: {0}")]
    UncoveredTimeRange(String),

    /// A drag chain or legacy link references a note that does not exist.
    #[error("note {from} references missing note {target}")]
    InvalidNoteReference { from: i64, target: i64 },

    /// A retime was requested at a tick that is not a tempo boundary.
    #[error("no tempo event at tick {0}, cannot retime there")]
    InvalidRetimeAnchor(i64),

    /// A retime ratio that is zero, negative or not finite.
    #[error("invalid retime ratio {0}")]
    InvalidRetimeRatio(f64),

    /// A note type code outside the known set.
    #[error("unsupported note type {0}")]
    UnsupportedNoteKind(i64),

    /// A measure length that is not a supported meter.
    #[error("unsupported measure length {0}")]
    UnsupportedMeter(f64),

    /// File could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ChartError {
    fn from(e: serde_json::Error) -> Self {
        // Validation failures raised inside `TryFrom<ChartFile>` arrive here as
        // custom serde errors; their message is already descriptive.
        ChartError::MalformedChart(e.to_string())
    }
}
