use std::net::{Ipv4Addr, SocketAddr};

use ion_core::{Context, Event, KeyValuePairs, SandboxLayout};

/// The control surface only serves the module on the same host.
pub fn control_addr(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

/// What one sidecar execution needs to know about its module and trigger.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub layout: SandboxLayout,
    /// Event the module is being run for
    pub trigger: Event,
    /// Event types the module may raise. Empty allows any.
    pub valid_event_types: Vec<String>,
}

impl SidecarConfig {
    pub fn new(layout: SandboxLayout, trigger: Event) -> Self {
        Self {
            layout,
            trigger,
            valid_event_types: Vec::new(),
        }
    }

    pub fn with_valid_event_types(mut self, types: Vec<String>) -> Self {
        self.valid_event_types = types;
        self
    }
}

/// Trigger event as described on the command line. `name` is the module type
/// being run, which becomes the newest entry in `previousStages` of anything
/// it raises.
#[derive(Debug, Clone, Default)]
pub struct TriggerArgs {
    pub name: String,
    pub event_id: String,
    pub event_type: String,
    /// Falls back to `event_id` when empty
    pub correlation_id: String,
    pub parent_event_id: String,
    pub previous_stages: Vec<String>,
}

impl From<TriggerArgs> for Event {
    fn from(args: TriggerArgs) -> Self {
        let correlation_id = if args.correlation_id.is_empty() {
            args.event_id.clone()
        } else {
            args.correlation_id
        };

        Event {
            context: Context {
                name: args.name,
                event_id: args.event_id,
                correlation_id,
                parent_event_id: args.parent_event_id,
            },
            event_type: args.event_type,
            previous_stages: args.previous_stages,
            data: KeyValuePairs::new(),
        }
    }
}

/// Split a comma separated list, dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_defaults_to_event_id() {
        let event: Event = TriggerArgs {
            name: "transcode".into(),
            event_id: "e1".into(),
            ..Default::default()
        }
        .into();

        assert_eq!(event.context.correlation_id, "e1");
        assert_eq!(event.context.name, "transcode");
    }

    #[test]
    fn control_surface_binds_loopback() {
        let addr = control_addr(8080);
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list(" a, b,,c ,"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
