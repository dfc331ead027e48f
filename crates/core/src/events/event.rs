use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::KeyValuePairs;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Identity of one event inside a pipeline run.
///
/// `correlation_id` is shared by every event of the run, `parent_event_id`
/// points at the event that caused this one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    #[serde(rename = "parentEventID", default)]
    pub parent_event_id: String,
}

impl Context {
    /// Context for an event raised while `self` was being handled by `name`
    pub fn child(&self, name: &str) -> Context {
        Context {
            name: name.to_string(),
            event_id: new_id(),
            correlation_id: self.correlation_id.clone(),
            parent_event_id: self.event_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireEvent", from = "WireEvent")]
pub struct Event {
    pub context: Context,
    pub event_type: String,
    /// Module types already executed on this lineage, oldest first
    pub previous_stages: Vec<String>,
    pub data: KeyValuePairs,
}

impl Event {
    /// An originating event. Its own id doubles as the correlation id.
    pub fn new_root(name: &str, event_type: &str) -> Self {
        let event_id = new_id();
        Self {
            context: Context {
                name: name.to_string(),
                correlation_id: event_id.clone(),
                event_id,
                parent_event_id: String::new(),
            },
            event_type: event_type.to_string(),
            previous_stages: Vec::new(),
            data: KeyValuePairs::new(),
        }
    }

    /// Build the event `stage` raises after handling `self`.
    pub fn derive(&self, stage: &str, event_type: &str, data: KeyValuePairs) -> Event {
        let mut previous_stages = self.previous_stages.clone();
        previous_stages.push(stage.to_string());

        Event {
            context: self.context.child(stage),
            event_type: event_type.to_string(),
            previous_stages,
            data,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.context.event_id
    }
}

/// Flat JSON shape published to the bus
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(rename = "eventID")]
    event_id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    previous_stages: Vec<String>,
    #[serde(rename = "correlationID")]
    correlation_id: String,
    #[serde(rename = "parentEventID", default, skip_serializing_if = "String::is_empty")]
    parent_event_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default)]
    data: KeyValuePairs,
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        WireEvent {
            event_id: event.context.event_id,
            event_type: event.event_type,
            previous_stages: event.previous_stages,
            correlation_id: event.context.correlation_id,
            parent_event_id: event.context.parent_event_id,
            name: event.context.name,
            data: event.data,
        }
    }
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        Event {
            context: Context {
                name: wire.name,
                event_id: wire.event_id,
                correlation_id: wire.correlation_id,
                parent_event_id: wire.parent_event_id,
            },
            event_type: wire.event_type,
            previous_stages: wire.previous_stages,
            data: wire.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeyValuePair;

    #[test]
    fn derive_propagates_lineage() {
        let mut trigger = Event::new_root("download", "file_downloaded");
        trigger.context.correlation_id = "c1".to_string();
        trigger.previous_stages = vec!["download".to_string()];

        let next = trigger.derive("transcode", "file_transcoded", KeyValuePairs::new());

        assert_eq!(next.context.correlation_id, "c1");
        assert_eq!(next.context.parent_event_id, trigger.event_id());
        assert_ne!(next.event_id(), trigger.event_id());
        assert_eq!(next.previous_stages, vec!["download", "transcode"]);
        assert_eq!(next.event_type, "file_transcoded");
        // the trigger itself is untouched
        assert_eq!(trigger.previous_stages, vec!["download"]);
    }

    #[test]
    fn wire_format_is_flat() {
        let event = Event {
            context: Context {
                name: String::new(),
                event_id: "e1".to_string(),
                correlation_id: "c1".to_string(),
                parent_event_id: String::new(),
            },
            event_type: "file_downloaded".to_string(),
            previous_stages: vec!["download".to_string()],
            data: KeyValuePairs::new().append(KeyValuePair::new("url", "http://x")),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "eventID": "e1",
                "type": "file_downloaded",
                "previousStages": ["download"],
                "correlationID": "c1",
                "data": [{"key": "url", "value": "http://x"}],
            })
        );

        let parsed: Event = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, event);
    }
}
