use serde::{Deserialize, Serialize};

use crate::events::{Context, KeyValuePairs};

/// Durable record of what one module execution consumed or produced,
/// keyed by `context.event_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub context: Context,
    #[serde(rename = "parentEventID", default)]
    pub parent_event_id: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub data: KeyValuePairs,
}

impl EventMeta {
    pub fn event_id(&self) -> &str {
        &self.context.event_id
    }
}

/// Structured findings of one execution, keyed by `execution_id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub context: Context,
    #[serde(rename = "executionID")]
    pub execution_id: String,
    #[serde(default)]
    pub data: KeyValuePairs,
}
