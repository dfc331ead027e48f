use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::{
    error::{DataplaneError, Result},
    events::{EventMeta, Insight},
    storage::document::DocumentStore,
};

pub const DEFAULT_SNAPSHOT_PATH: &str = ".memdb";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    insights: HashMap<String, Insight>,
    #[serde(default)]
    event_metas: HashMap<String, EventMeta>,
}

/// Document store held in process memory and persisted to a snapshot file
/// only on `snapshot()`/`close()`. Writes since the last snapshot are lost on
/// a crash.
///
/// Single process only: there is no lock file and no merge on load, so two
/// instances sharing a snapshot overwrite each other.
pub struct InMemoryDocumentStore {
    snapshot_path: PathBuf,
    state: Snapshot,
}

impl InMemoryDocumentStore {
    pub async fn open(snapshot_path: impl Into<PathBuf>) -> Result<Self> {
        let snapshot_path = snapshot_path.into();

        let state = match fs::read(&snapshot_path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                DataplaneError::serialization(format!("snapshot {}", snapshot_path.display()), e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(DataplaneError::io("read snapshot", &snapshot_path, e)),
        };

        info!(
            path = %snapshot_path.display(),
            event_metas = state.event_metas.len(),
            insights = state.insights.len(),
            "in-memory document store opened"
        );

        Ok(Self {
            snapshot_path,
            state,
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn get_insight(&self, execution_id: &str) -> Option<&Insight> {
        self.state.insights.get(execution_id)
    }

    pub fn len(&self) -> usize {
        self.state.event_metas.len() + self.state.insights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the full state to a sibling temp file, then rename it over the
    /// snapshot.
    pub async fn snapshot(&self) -> Result<()> {
        let raw = serde_json::to_vec(&self.state).map_err(|e| {
            DataplaneError::serialization(format!("snapshot {}", self.snapshot_path.display()), e)
        })?;

        if let Some(parent) = self.snapshot_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DataplaneError::io("create snapshot dir", parent, e))?;
        }

        let mut tmp = self.snapshot_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, raw)
            .await
            .map_err(|e| DataplaneError::io("write snapshot", &tmp, e))?;
        fs::rename(&tmp, &self.snapshot_path)
            .await
            .map_err(|e| DataplaneError::io("replace snapshot", &self.snapshot_path, e))?;

        debug!(path = %self.snapshot_path.display(), "snapshot written");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_event_meta_by_id(&self, id: &str) -> Result<EventMeta> {
        self.state
            .event_metas
            .get(id)
            .cloned()
            .ok_or_else(|| DataplaneError::NotFound {
                what: "event meta",
                id: id.to_string(),
            })
    }

    async fn create_event_meta(&mut self, meta: &EventMeta) -> Result<()> {
        self.state
            .event_metas
            .insert(meta.event_id().to_string(), meta.clone());
        Ok(())
    }

    async fn create_insight(&mut self, insight: &Insight) -> Result<()> {
        self.state
            .insights
            .insert(insight.execution_id.clone(), insight.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.snapshot().await
    }
}
