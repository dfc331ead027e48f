//! MongoDB-compatible document store.
//!
//! Each write is a keyed upsert, so concurrent sidecars never read-modify-write;
//! two writers on the same key silently resolve to the last one.

use async_trait::async_trait;
use bson::{Document, doc};
use mongodb::{
    Client, Collection,
    options::{ClientOptions, Tls, TlsOptions},
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::{DataplaneError, Result},
    events::{EventMeta, Insight},
    storage::document::DocumentStore,
};

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub event_meta_collection: String,
    pub insight_collection: String,
    pub tls: bool,
}

pub struct MongoDocumentStore {
    client: Client,
    event_metas: Collection<Document>,
    insights: Collection<Document>,
}

fn backend(op: &'static str, id: &str, err: impl std::fmt::Display) -> DataplaneError {
    DataplaneError::Backend {
        op,
        id: id.to_string(),
        reason: err.to_string(),
    }
}

fn event_meta_filter(id: &str) -> Document {
    doc! { "context.eventID": id }
}

fn insight_filter(execution_id: &str) -> Document {
    doc! { "executionID": execution_id }
}

fn to_document<T: Serialize>(value: &T, what: &str, id: &str) -> Result<Document> {
    bson::to_document(value).map_err(|e| DataplaneError::serialization(format!("{what} {id}"), e))
}

impl MongoDocumentStore {
    pub async fn connect(config: MongoConfig) -> Result<Self> {
        info!(database = %config.database, tls = config.tls, "connecting to document store");

        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| backend("parse uri", &config.database, e))?;
        if config.tls {
            options.tls = Some(Tls::Enabled(TlsOptions::default()));
        }

        let client =
            Client::with_options(options).map_err(|e| backend("connect", &config.database, e))?;
        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| backend("ping", &config.database, e))?;

        info!(database = %config.database, "connected to document store");

        Ok(Self {
            event_metas: database.collection(&config.event_meta_collection),
            insights: database.collection(&config.insight_collection),
            client,
        })
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn get_event_meta_by_id(&self, id: &str) -> Result<EventMeta> {
        let found = self
            .event_metas
            .find_one(event_meta_filter(id))
            .await
            .map_err(|e| backend("get event meta", id, e))?;

        let Some(document) = found else {
            return Err(DataplaneError::NotFound {
                what: "event meta",
                id: id.to_string(),
            });
        };

        bson::from_document(document)
            .map_err(|e| DataplaneError::serialization(format!("event meta {id}"), e))
    }

    async fn create_event_meta(&mut self, meta: &EventMeta) -> Result<()> {
        let id = meta.event_id();
        let document = to_document(meta, "event meta", id)?;

        self.event_metas
            .replace_one(event_meta_filter(id), document)
            .upsert(true)
            .await
            .map_err(|e| backend("create event meta", id, e))?;

        debug!(event_id = %id, "event meta upserted");
        Ok(())
    }

    async fn create_insight(&mut self, insight: &Insight) -> Result<()> {
        let id = insight.execution_id.as_str();
        let document = to_document(insight, "insight", id)?;

        self.insights
            .replace_one(insight_filter(id), document)
            .upsert(true)
            .await
            .map_err(|e| backend("create insight", id, e))?;

        debug!(execution_id = %id, "insight upserted");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Round trips against a live server are out of scope here; these pin the
    // document shape the keyed queries rely on.
    use super::*;
    use crate::events::{Context, KeyValuePair, KeyValuePairs};

    #[test]
    fn event_meta_document_matches_filter_path() {
        let meta = EventMeta {
            context: Context {
                name: "transcode".to_string(),
                event_id: "e1".to_string(),
                correlation_id: "c1".to_string(),
                parent_event_id: "p1".to_string(),
            },
            parent_event_id: "p1".to_string(),
            files: vec!["a.raw".to_string()],
            data: KeyValuePairs::new().append(KeyValuePair::new("k", "v")),
        };

        let document = to_document(&meta, "event meta", "e1").unwrap();
        let context = document.get_document("context").unwrap();
        assert_eq!(context.get_str("eventID").unwrap(), "e1");
        assert_eq!(event_meta_filter("e1"), doc! { "context.eventID": "e1" });

        let back: EventMeta = bson::from_document(document).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn insight_document_is_keyed_by_execution_id() {
        let insight = Insight {
            context: Context::default(),
            execution_id: "x1".to_string(),
            data: KeyValuePairs::new(),
        };

        let document = to_document(&insight, "insight", "x1").unwrap();
        assert_eq!(document.get_str("executionID").unwrap(), "x1");
    }
}
