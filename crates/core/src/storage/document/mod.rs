pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::{
    error::Result,
    events::{EventMeta, Insight},
};

pub use memory::{DEFAULT_SNAPSHOT_PATH, InMemoryDocumentStore};
pub use mongo::{MongoConfig, MongoDocumentStore};

/// Stores lineage metadata and insights.
///
/// Both writes are upserts: a second write with the same key replaces the
/// first. No conflict is detected between concurrent writers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_event_meta_by_id(&self, id: &str) -> Result<EventMeta>;

    async fn create_event_meta(&mut self, meta: &EventMeta) -> Result<()>;

    async fn create_insight(&mut self, insight: &Insight) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum DocumentStoreConfig {
    Memory { snapshot_path: std::path::PathBuf },
    Mongo(MongoConfig),
}

impl DocumentStoreConfig {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentStoreConfig::Memory { .. } => "memory",
            DocumentStoreConfig::Mongo(_) => "mongo",
        }
    }

    pub async fn open(self) -> Result<Box<dyn DocumentStore>> {
        match self {
            DocumentStoreConfig::Memory { snapshot_path } => {
                Ok(Box::new(InMemoryDocumentStore::open(snapshot_path).await?))
            }
            DocumentStoreConfig::Mongo(cfg) => Ok(Box::new(MongoDocumentStore::connect(cfg).await?)),
        }
    }
}
