use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{
    error::{DataplaneError, Result},
    events::Event,
};

/// Hands freshly built events to whatever transport carries them downstream.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &Event) -> Result<()>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes every published event as `<eventID>.json` into a directory.
/// Used for local development where no bus is running. Event ids are unique,
/// so several executions can share one directory.
pub struct DirectoryPublisher {
    dir: PathBuf,
    published: AtomicU64,
}

impl DirectoryPublisher {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| DataplaneError::io("create publisher dir", &dir, e))?;

        Ok(Self {
            dir,
            published: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventPublisher for DirectoryPublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        let event_id = event.event_id();
        if event_id.is_empty() || event_id.contains(['/', '\\']) || event_id.starts_with('.') {
            return Err(DataplaneError::Backend {
                op: "publish",
                id: event_id.to_string(),
                reason: "event id is not usable as a file name".to_string(),
            });
        }
        let path = self.dir.join(format!("{event_id}.json"));

        let body = serde_json::to_vec_pretty(event)
            .map_err(|e| DataplaneError::serialization(format!("event {}", event.event_id()), e))?;
        fs::write(&path, body)
            .await
            .map_err(|e| DataplaneError::io("publish event", &path, e))?;
        self.published.fetch_add(1, Ordering::Relaxed);

        debug!(event_id = event.event_id(), event_type = %event.event_type, path = %path.display(), "event written");
        Ok(())
    }
}
