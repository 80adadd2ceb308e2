//! Wire format of the tick-domain chart schema.
//!
//! These structs mirror the JSON layout one-to-one. [`Chart`](super::Chart)
//! converts from them with validation and back without loss.

use super::{EventOrder, Tick};
use serde::{Deserialize, Deserializer, Serialize};

/// Deserializes a tick that may have been written as a fractional number.
pub(crate) fn deserialize_tick<'de, D>(deserializer: D) -> Result<Tick, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("tick must be a finite number"));
    }
    Ok(super::round_tick(value))
}

/// Top-level chart record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartFile {
    #[serde(default)]
    pub format_version: i64,

    #[serde(default)]
    pub start_offset_time: f64,

    pub time_base: i64,

    pub page_list: Vec<PageRecord>,

    pub tempo_list: Vec<TempoRecord>,

    #[serde(default)]
    pub event_order_list: Vec<EventOrder>,

    pub note_list: Vec<NoteRecord>,
}

/// One entry of `page_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(deserialize_with = "deserialize_tick")]
    pub start_tick: Tick,

    #[serde(deserialize_with = "deserialize_tick")]
    pub end_tick: Tick,

    pub scan_line_direction: i64,

    #[serde(
        rename = "PositionFunction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub position_function: Option<PositionFunctionRecord>,
}

/// Page position function as written in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFunctionRecord {
    #[serde(rename = "Type")]
    pub kind: i64,

    #[serde(rename = "Arguments")]
    pub arguments: Vec<f64>,
}

/// One entry of `tempo_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoRecord {
    #[serde(deserialize_with = "deserialize_tick")]
    pub tick: Tick,

    /// Microseconds per beat.
    pub value: f64,
}

/// One entry of `note_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: i64,

    #[serde(deserialize_with = "deserialize_tick")]
    pub tick: Tick,

    pub x: f64,

    #[serde(rename = "type")]
    pub kind: i64,

    #[serde(default, deserialize_with = "deserialize_tick")]
    pub hold_tick: Tick,

    #[serde(default)]
    pub next_id: i64,

    #[serde(default)]
    pub is_forward: bool,

    #[serde(default)]
    pub page_index: i64,

    #[serde(default)]
    pub has_sibling: bool,
}
