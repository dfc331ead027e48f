use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{
    error::{DataplaneError, Result},
    events::{BusConfig, BusMetrics, Event, EventPublisher},
};

pub struct Route {
    pub subscriber_id: String,
    pub inbox: mpsc::Sender<Event>,
}

/// In-process bus addressing events by their type.
///
/// Delivery never blocks: a full inbox drops the event and bumps
/// `BusMetrics::dropped_total`.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

struct EventBusInner {
    routes: HashMap<String, Vec<Route>>,
    metrics: Arc<BusMetrics>,
    strict_routing: bool,
}

impl EventBus {
    pub fn new(cfg: BusConfig, routes: HashMap<String, Vec<Route>>, metrics: Arc<BusMetrics>) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                routes,
                metrics,
                strict_routing: cfg.strict_routing,
            }),
        }
    }

    pub fn route(&self, event: Event) -> Result<()> {
        let Some(routes) = self.inner.routes.get(&event.event_type) else {
            warn!(event_type = %event.event_type, "no subscriber for event type");
            self.inner.metrics.record_unrouted();

            if self.inner.strict_routing {
                return Err(DataplaneError::Backend {
                    op: "publish",
                    id: event.event_type,
                    reason: "no subscriber for event type".to_string(),
                });
            }

            return Ok(());
        };

        for route in routes {
            if route.inbox.try_send(event.clone()).is_err() {
                warn!(
                    subscriber_id = %route.subscriber_id,
                    event_type = %event.event_type,
                    "inbox full or closed, event dropped"
                );
                self.inner.metrics.record_dropped();
            }
        }

        Ok(())
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.inner.metrics
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: &Event) -> Result<()> {
        self.route(event.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBusBuilder, SubscriptionSpec};
    use std::sync::atomic::Ordering;

    fn build(strict_routing: bool) -> (EventBus, crate::events::BusWiring) {
        EventBusBuilder::new(BusConfig { strict_routing })
            .subscribe(SubscriptionSpec {
                subscriber_id: "transcode".to_string(),
                event_types: vec!["file_downloaded".to_string()],
                capacity: 1,
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn routes_by_event_type() {
        let (bus, mut wiring) = build(false);
        let mut inbox = wiring.take("transcode").unwrap();

        let event = Event::new_root("download", "file_downloaded");
        bus.publish(&event).await.unwrap();

        assert_eq!(inbox.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn counts_unrouted_and_dropped() {
        let (bus, mut wiring) = build(false);
        let _inbox = wiring.take("transcode").unwrap();

        bus.publish(&Event::new_root("x", "nobody_listens")).await.unwrap();
        bus.publish(&Event::new_root("x", "file_downloaded")).await.unwrap();
        bus.publish(&Event::new_root("x", "file_downloaded")).await.unwrap();

        assert_eq!(bus.metrics().unrouted_publish_total.load(Ordering::Relaxed), 1);
        assert_eq!(bus.metrics().dropped_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn strict_routing_rejects_unknown_types() {
        let (bus, _wiring) = build(true);
        let err = bus
            .publish(&Event::new_root("x", "nobody_listens"))
            .await
            .unwrap_err();
        assert!(matches!(err, DataplaneError::Backend { op: "publish", .. }));
    }
}
