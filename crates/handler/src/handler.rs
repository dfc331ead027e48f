use std::path::{Path, PathBuf};

use ion_core::{
    DataplaneError, KeyValuePair, KeyValuePairs, Result, SandboxLayout,
    events::{EVENT_TYPE_KEY, FILES_KEY},
};
use tokio::fs;
use tracing::{debug, info};

use crate::{HandlerConfig, SidecarClient};

/// An event the module wants raised once it commits.
#[derive(Debug, Clone, Default)]
pub struct OutputEvent {
    pub event_type: String,
    /// Names of files under `out/data` this event refers to
    pub files: Vec<String>,
    pub data: KeyValuePairs,
}

impl OutputEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, name: impl Into<String>) -> Self {
        self.files.push(name.into());
        self
    }

    pub fn with_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data = self.data.append(KeyValuePair::new(key, value));
        self
    }

    /// `eventType` first, `files` second, then the free-form pairs
    pub fn to_pairs(&self) -> KeyValuePairs {
        self.data.iter().cloned().fold(
            KeyValuePairs::new()
                .append(KeyValuePair::new(EVENT_TYPE_KEY, &self.event_type))
                .append(KeyValuePair::new(FILES_KEY, self.files.join(","))),
            KeyValuePairs::append,
        )
    }
}

/// The module's view of its sandbox and sidecar.
///
/// Every error returned here is meant to be fatal: propagate it out of
/// `main` so the process terminates instead of committing partial state.
pub struct Handler {
    layout: SandboxLayout,
    client: SidecarClient,
    events_raised: usize,
    insights_written: bool,
}

impl Handler {
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            layout: SandboxLayout::new(config.base_dir),
            client: SidecarClient::new(config.sidecar_port),
            events_raised: 0,
            insights_written: false,
        }
    }

    pub fn layout(&self) -> &SandboxLayout {
        &self.layout
    }

    /// Tell the sidecar the module is up. Input is materialised once this
    /// returns.
    pub async fn ready(&self) -> Result<()> {
        self.client.ready().await?;
        info!("sidecar ready");
        Ok(())
    }

    /// Tell the sidecar every output is written. The sidecar commits before
    /// answering.
    pub async fn done(&self) -> Result<()> {
        self.client.done().await?;
        info!(events = self.events_raised, "sidecar committed outputs");
        Ok(())
    }

    pub async fn read_event_meta(&self) -> Result<KeyValuePairs> {
        let path = self.layout.in_event_meta_file();
        let raw = fs::read(&path)
            .await
            .map_err(|e| DataplaneError::io("read event meta", &path, e))?;

        serde_json::from_slice(&raw)
            .map_err(|e| DataplaneError::serialization(path.display().to_string(), e))
    }

    /// Input blobs, sorted by path
    pub async fn input_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.layout.in_data_dir();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| DataplaneError::io("list input blobs", &dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DataplaneError::io("list input blobs", &dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| DataplaneError::io("stat input blob", entry.path(), e))?
                .is_file();
            if is_file {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Where an output blob called `name` must be written
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.layout.out_data_dir().join(name)
    }

    /// Write `out/events/event-<n>.json`, numbering events in the order raised.
    pub async fn raise_event(&mut self, event: &OutputEvent) -> Result<PathBuf> {
        let path = self.layout.event_file(self.events_raised);
        write_json(&path, &event.to_pairs()).await?;
        self.events_raised += 1;

        debug!(event_type = %event.event_type, path = %path.display(), "event raised");
        Ok(path)
    }

    pub async fn write_insights(&mut self, insights: &KeyValuePairs) -> Result<()> {
        if self.insights_written {
            return Err(DataplaneError::AlreadyWritten { what: "insights" });
        }

        let path = self.layout.out_insights_file();
        write_json(&path, insights).await?;
        self.insights_written = true;

        debug!(pairs = insights.len(), "insights written");
        Ok(())
    }
}

async fn write_json(path: &Path, pairs: &KeyValuePairs) -> Result<()> {
    let body = serde_json::to_vec(pairs)
        .map_err(|e| DataplaneError::serialization(path.display().to_string(), e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DataplaneError::io("create output dir", parent, e))?;
    }
    fs::write(path, body)
        .await
        .map_err(|e| DataplaneError::io("write output", path, e))
}
