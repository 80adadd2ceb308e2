//! Event order entries.
//!
//! Event orders carry presentation events (tempo flashes, UI changes, custom
//! text). Only their tick is interpreted, so retiming can move them; every
//! other field is kept verbatim.

use super::schema::deserialize_tick;
use super::Tick;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of `event_order_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOrder {
    #[serde(deserialize_with = "deserialize_tick")]
    pub tick: Tick,

    #[serde(default)]
    pub event_list: Vec<ChartEvent>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single event inside an [`EventOrder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartEvent {
    #[serde(rename = "type")]
    pub kind: i64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventOrder {
    /// Creates an entry with no inner events.
    pub fn new(tick: Tick) -> Self {
        Self {
            tick,
            event_list: Vec::new(),
            extra: Map::new(),
        }
    }
}
