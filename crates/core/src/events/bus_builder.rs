use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::events::{Event, EventBus, Route};

pub struct BusConfig {
    pub strict_routing: bool,
}

#[derive(Default)]
pub struct BusMetrics {
    pub unrouted_publish_total: AtomicU64,
    pub dropped_total: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unrouted(&self) {
        self.unrouted_publish_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_total.fetch_add(1, Ordering::Relaxed);
    }
}

/// One downstream consumer and the event types it listens to.
pub struct SubscriptionSpec {
    pub subscriber_id: String,
    pub event_types: Vec<String>,
    pub capacity: usize,
}

pub struct BusWiring {
    inboxes: HashMap<String, mpsc::Receiver<Event>>,
}

impl BusWiring {
    pub fn take(&mut self, subscriber_id: &str) -> Option<mpsc::Receiver<Event>> {
        self.inboxes.remove(subscriber_id)
    }
}

fn validate(subs: &[SubscriptionSpec]) -> Result<()> {
    let mut seen_subscribers: HashSet<&str> = HashSet::new();
    for s in subs {
        if s.subscriber_id.trim().is_empty() {
            anyhow::bail!("empty subscriber_id");
        }
        if !seen_subscribers.insert(&s.subscriber_id) {
            anyhow::bail!("duplicate subscriber_id={}", s.subscriber_id);
        }
        if s.event_types.is_empty() {
            anyhow::bail!("subscriber_id={} has no event types", s.subscriber_id);
        }
        anyhow::ensure!(s.capacity > 0, "capacity must be > 0");

        let mut seen_types: HashSet<&str> = HashSet::new();
        for t in &s.event_types {
            if t.trim().is_empty() {
                anyhow::bail!("subscriber_id={} has empty event_type", s.subscriber_id);
            }
            if !seen_types.insert(t) {
                anyhow::bail!(
                    "subscriber_id={} has duplicate event_type={}",
                    s.subscriber_id,
                    t
                );
            }
        }
    }
    Ok(())
}

pub struct EventBusBuilder {
    cfg: BusConfig,
    subs: Vec<SubscriptionSpec>,
}

impl EventBusBuilder {
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            subs: Vec::new(),
        }
    }

    pub fn subscribe(mut self, s: SubscriptionSpec) -> Self {
        self.subs.push(s);
        self
    }

    pub fn build(self) -> Result<(EventBus, BusWiring)> {
        validate(&self.subs)?;

        let mut routes: HashMap<String, Vec<Route>> = HashMap::new();
        let mut inboxes = HashMap::new();
        let metrics = Arc::new(BusMetrics::new());

        for spec in self.subs {
            let (tx, rx) = mpsc::channel::<Event>(spec.capacity);

            for event_type in spec.event_types {
                routes.entry(event_type).or_default().push(Route {
                    subscriber_id: spec.subscriber_id.clone(),
                    inbox: tx.clone(),
                });
            }

            inboxes.insert(spec.subscriber_id, rx);
        }

        let bus = EventBus::new(self.cfg, routes, metrics);
        Ok((bus, BusWiring { inboxes }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, types: &[&str]) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: id.to_string(),
            event_types: types.iter().map(|t| t.to_string()).collect(),
            capacity: 4,
        }
    }

    #[test]
    fn rejects_duplicate_subscribers() {
        let result = EventBusBuilder::new(BusConfig {
            strict_routing: false,
        })
        .subscribe(spec("transcode", &["file_downloaded"]))
        .subscribe(spec("transcode", &["file_uploaded"]))
        .build();

        assert!(result.is_err());
    }

    #[test]
    fn rejects_subscriber_without_types() {
        let result = EventBusBuilder::new(BusConfig {
            strict_routing: false,
        })
        .subscribe(spec("detect", &[]))
        .build();

        assert!(result.is_err());
    }
}
