use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use ion_core::{
    BlobStore, DataplaneError, DocumentStore, Event, EventMeta, EventPublisher, Insight,
    KeyValuePair, KeyValuePairs, Result, SandboxLayout,
    events::{EVENT_TYPE_KEY, FILES_KEY},
};
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub blobs: usize,
    pub insight: bool,
    pub events: Vec<String>,
}

/// Harvests a module's `out/` tree once it reports done.
pub struct Committer<'a> {
    pub layout: &'a SandboxLayout,
    /// Event that triggered this execution; `context.name` is the module type
    pub trigger: &'a Event,
    pub execution_id: &'a str,
    /// Event types the module may raise. Empty allows any.
    pub valid_event_types: &'a [String],
}

impl Committer<'_> {
    /// Upload blobs, validate and build every event, store the insight, then
    /// for each event store its EventMeta and publish it.
    ///
    /// Nothing is rolled back across steps: a failure after the upload leaves
    /// the execution partially committed.
    pub async fn commit(
        &self,
        blobs: &dyn BlobStore,
        documents: &mut dyn DocumentStore,
        publisher: &dyn EventPublisher,
    ) -> Result<CommitSummary> {
        let out_data = self.layout.out_data_dir();
        let sources = list_files(&out_data).await?;
        let uris = blobs.put_blobs(&sources).await?;
        info!(blobs = uris.len(), "committed blob data");

        let mut built = Vec::new();
        for path in list_event_files(&self.layout.out_events_dir()).await? {
            let pairs = read_pairs(&path).await?;
            built.push(self.build_event(&path, pairs, &uris)?);
        }

        let insight = self.commit_insight(documents).await?;

        let mut summary = CommitSummary {
            blobs: uris.len(),
            insight,
            events: Vec::with_capacity(built.len()),
        };
        for (event, meta) in built {
            documents.create_event_meta(&meta).await?;
            publisher.publish(&event).await?;
            debug!(event_id = event.event_id(), event_type = %event.event_type, "event published");
            summary.events.push(event.context.event_id);
        }

        info!(events = summary.events.len(), "committed events");
        Ok(summary)
    }

    async fn commit_insight(&self, documents: &mut dyn DocumentStore) -> Result<bool> {
        let path = self.layout.out_insights_file();
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(DataplaneError::io("read insights", &path, e)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(false);
        }

        let data: KeyValuePairs = serde_json::from_slice(&raw)
            .map_err(|e| DataplaneError::serialization(path.display().to_string(), e))?;
        let insight = Insight {
            context: self.trigger.context.clone(),
            execution_id: self.execution_id.to_string(),
            data,
        };
        documents.create_insight(&insight).await?;

        info!("committed insights");
        Ok(true)
    }

    fn build_event(
        &self,
        path: &Path,
        pairs: KeyValuePairs,
        uris: &HashMap<PathBuf, String>,
    ) -> Result<(Event, EventMeta)> {
        let file = path.display().to_string();
        let invalid = |reason: String| DataplaneError::InvalidEvent {
            file: file.clone(),
            reason,
        };

        let Some(type_index) = pairs.position(EVENT_TYPE_KEY) else {
            return Err(invalid(format!("missing required '{EVENT_TYPE_KEY}'")));
        };
        let event_type = pairs.get(EVENT_TYPE_KEY).unwrap_or_default().trim().to_string();
        if event_type.is_empty() {
            return Err(invalid(format!("empty '{EVENT_TYPE_KEY}'")));
        }
        if !self.valid_event_types.is_empty() && !self.valid_event_types.contains(&event_type) {
            return Err(invalid(format!(
                "module may not publish events of type '{event_type}'"
            )));
        }
        let mut pairs = pairs.remove(type_index)?;

        let Some(files_index) = pairs.position(FILES_KEY) else {
            return Err(invalid(format!("missing required '{FILES_KEY}'")));
        };
        let csv = pairs.get(FILES_KEY).unwrap_or_default().to_string();
        pairs = pairs.remove(files_index)?;
        let files: Vec<String> = csv
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        // Only blobs harvested from the top level of out/data can be referenced
        let out_data = self.layout.out_data_dir();
        for name in &files {
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(invalid(format!("file '{name}' is not a plain file name")));
            }
            let Some(uri) = uris.get(&out_data.join(name)) else {
                return Err(invalid(format!("file '{name}' does not exist in output")));
            };
            pairs = pairs.append(KeyValuePair::new(name, uri));
        }

        let stage = self.trigger.context.name.as_str();
        let event = self.trigger.derive(stage, &event_type, pairs.clone());
        let meta = EventMeta {
            context: event.context.clone(),
            parent_event_id: self.trigger.context.event_id.clone(),
            files,
            data: pairs,
        };

        Ok((event, meta))
    }
}

async fn read_pairs(path: &Path) -> Result<KeyValuePairs> {
    let raw = fs::read(path)
        .await
        .map_err(|e| DataplaneError::io("read event file", path, e))?;
    serde_json::from_slice(&raw)
        .map_err(|e| DataplaneError::serialization(path.display().to_string(), e))
}

/// Regular files directly under `dir`, sorted by name
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DataplaneError::io("list dir", dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DataplaneError::io("list dir", dir, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| DataplaneError::io("stat entry", entry.path(), e))?
            .is_file();
        if is_file {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Event files in the order they were raised: `event-<n>.json` by `n`, anything
/// else after them by name.
async fn list_event_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = list_files(dir).await?;
    files.sort_by_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let n = name
            .strip_prefix("event-")
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(u64::MAX);
        (n, name)
    });
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ion_core::{
        events::DirectoryPublisher,
        storage::{FilesystemBlobStore, FilesystemConfig, InMemoryDocumentStore},
    };
    use tempfile::TempDir;

    struct Fixture {
        temp_dir: TempDir,
        layout: SandboxLayout,
        trigger: Event,
        blobs: FilesystemBlobStore,
        documents: InMemoryDocumentStore,
        publisher: DirectoryPublisher,
    }

    impl Fixture {
        async fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let layout = SandboxLayout::new(temp_dir.path().join("sandbox"));
            layout.prepare().await.unwrap();

            let blob_root = temp_dir.path().join("blobs");
            let blobs = FilesystemBlobStore::new(FilesystemConfig {
                input_dir: blob_root.clone(),
                output_dir: blob_root,
            })
            .await
            .unwrap();
            let documents = InMemoryDocumentStore::open(temp_dir.path().join(".memdb"))
                .await
                .unwrap();
            let publisher = DirectoryPublisher::new(temp_dir.path().join("bus")).await.unwrap();

            let mut trigger = Event::new_root("transcode", "file_downloaded");
            trigger.context.correlation_id = "c1".to_string();
            trigger.previous_stages = vec!["download".to_string()];

            Self {
                temp_dir,
                layout,
                trigger,
                blobs,
                documents,
                publisher,
            }
        }

        fn write_output(&self, name: &str, body: &[u8]) {
            std::fs::write(self.layout.out_data_dir().join(name), body).unwrap();
        }

        fn write_event(&self, n: usize, pairs: &[(&str, &str)]) {
            let pairs: KeyValuePairs = pairs
                .iter()
                .map(|(k, v)| KeyValuePair::new(*k, *v))
                .collect();
            std::fs::write(self.layout.event_file(n), serde_json::to_vec(&pairs).unwrap()).unwrap();
        }

        async fn commit(&mut self, valid: &[&str]) -> Result<CommitSummary> {
            let valid: Vec<String> = valid.iter().map(|s| s.to_string()).collect();
            let committer = Committer {
                layout: &self.layout,
                trigger: &self.trigger,
                execution_id: "x1",
                valid_event_types: &valid,
            };
            committer
                .commit(&self.blobs, &mut self.documents, &self.publisher)
                .await
        }

        fn published(&self, event_id: &str) -> Event {
            let raw = std::fs::read(self.temp_dir.path().join("bus").join(format!("{event_id}.json")))
                .unwrap();
            serde_json::from_slice(&raw).unwrap()
        }
    }

    #[tokio::test]
    async fn emitted_event_carries_lineage_and_meta() {
        let mut f = Fixture::new().await;
        f.write_output("a.mp4", b"video");
        f.write_event(
            0,
            &[
                ("eventType", "file_transcoded"),
                ("files", "a.mp4"),
                ("codec", "h264"),
            ],
        );

        let summary = f.commit(&["file_transcoded"]).await.unwrap();
        assert_eq!(summary.blobs, 1);
        assert!(!summary.insight);
        assert_eq!(summary.events.len(), 1);

        let event = f.published(&summary.events[0]);
        assert_eq!(event.event_type, "file_transcoded");
        assert_eq!(event.context.correlation_id, "c1");
        assert_eq!(event.context.parent_event_id, f.trigger.event_id());
        assert_eq!(event.previous_stages, vec!["download", "transcode"]);
        assert_eq!(event.data.get("codec"), Some("h264"));
        assert_eq!(event.data.get("eventType"), None);
        assert!(event.data.get("a.mp4").unwrap().ends_with("a.mp4"));

        let meta = f.documents.get_event_meta_by_id(event.event_id()).await.unwrap();
        assert_eq!(meta.files, vec!["a.mp4"]);
        assert_eq!(meta.parent_event_id, f.trigger.event_id());
        assert_eq!(meta.data, event.data);
    }

    #[tokio::test]
    async fn insight_is_stored_under_execution_id() {
        let mut f = Fixture::new().await;
        std::fs::write(
            f.layout.out_insights_file(),
            br#"[{"key":"transcodeTimeSec","value":"1.5"}]"#,
        )
        .unwrap();

        let summary = f.commit(&[]).await.unwrap();

        assert!(summary.insight);
        let insight = f.documents.get_insight("x1").unwrap();
        assert_eq!(insight.data.get("transcodeTimeSec"), Some("1.5"));
        assert_eq!(insight.context, f.trigger.context);
    }

    #[tokio::test]
    async fn events_follow_numeric_order() {
        let mut f = Fixture::new().await;
        for n in [10, 2, 0] {
            let event_type = format!("type_{n}");
            f.write_event(n, &[("eventType", event_type.as_str()), ("files", "")]);
        }

        let summary = f.commit(&[]).await.unwrap();

        let types: Vec<String> = summary
            .events
            .iter()
            .map(|id| f.published(id).event_type)
            .collect();
        assert_eq!(types, vec!["type_0", "type_2", "type_10"]);
    }

    #[tokio::test]
    async fn rejects_event_type_not_allowed() {
        let mut f = Fixture::new().await;
        f.write_event(0, &[("eventType", "face_detected"), ("files", "")]);

        let err = f.commit(&["file_transcoded"]).await.unwrap_err();
        assert!(matches!(err, DataplaneError::InvalidEvent { .. }));
    }

    #[tokio::test]
    async fn rejects_event_without_type() {
        let mut f = Fixture::new().await;
        f.write_event(0, &[("files", "")]);

        let err = f.commit(&[]).await.unwrap_err();
        assert!(err.to_string().contains("eventType"));
    }

    #[tokio::test]
    async fn rejects_reference_to_missing_output() {
        let mut f = Fixture::new().await;
        f.write_event(0, &[("eventType", "file_transcoded"), ("files", "ghost.mp4")]);

        let err = f.commit(&[]).await.unwrap_err();
        assert!(err.to_string().contains("ghost.mp4"));
        assert_eq!(f.publisher.published(), 0);
    }

    #[tokio::test]
    async fn ignores_empty_file_names() {
        let mut f = Fixture::new().await;
        f.write_output("a.mp4", b"video");
        f.write_event(0, &[("eventType", "t"), ("files", "a.mp4,,")]);

        let summary = f.commit(&[]).await.unwrap();

        let meta = f
            .documents
            .get_event_meta_by_id(&summary.events[0])
            .await
            .unwrap();
        assert_eq!(meta.files, vec!["a.mp4"]);
    }

    #[tokio::test]
    async fn rejects_event_without_files_entry() {
        let mut f = Fixture::new().await;
        f.write_event(0, &[("eventType", "t")]);

        let err = f.commit(&[]).await.unwrap_err();

        assert!(matches!(err, DataplaneError::InvalidEvent { ref reason, .. } if reason.contains("files")));
        assert_eq!(f.publisher.published(), 0);
    }

    #[tokio::test]
    async fn rejects_names_outside_harvested_blobs() {
        for files in ["../insights.json", "frames", "frames/0001.png"] {
            let mut f = Fixture::new().await;
            std::fs::write(f.layout.out_insights_file(), b"[]").unwrap();
            std::fs::create_dir(f.layout.out_data_dir().join("frames")).unwrap();
            std::fs::write(f.layout.out_data_dir().join("frames/0001.png"), b"png").unwrap();
            f.write_event(0, &[("eventType", "t"), ("files", files)]);

            let err = f.commit(&[]).await.unwrap_err();

            assert!(
                matches!(err, DataplaneError::InvalidEvent { .. }),
                "{files} accepted: {err:?}"
            );
            assert_eq!(f.publisher.published(), 0);
        }
    }
}
