use ion_core::{
    BlobStore, DataplaneError, DocumentStore, EventMeta, KeyValuePairs, Result, SandboxLayout,
};
use tokio::fs;
use tracing::{debug, info};

/// Materialise the triggering event's input into the sandbox.
///
/// An event with no stored EventMeta is the root of its lineage: it gets no
/// input blobs and an empty `in/eventmeta.json`. Any other lookup failure is
/// returned.
pub async fn prepare(
    layout: &SandboxLayout,
    blobs: &dyn BlobStore,
    documents: &dyn DocumentStore,
    event_id: &str,
) -> Result<Option<EventMeta>> {
    let meta = match documents.get_event_meta_by_id(event_id).await {
        Ok(meta) => Some(meta),
        Err(e) if e.is_not_found() => {
            debug!(event_id = %event_id, "no event meta stored, treating as root event");
            None
        }
        Err(e) => return Err(e),
    };

    let data = match &meta {
        Some(meta) => {
            info!(files = ?meta.files, "fetching input blobs");
            blobs.get_blobs(&layout.in_data_dir(), &meta.files).await?;
            meta.data.clone()
        }
        None => KeyValuePairs::new(),
    };

    let path = layout.in_event_meta_file();
    let body = serde_json::to_vec(&data)
        .map_err(|e| DataplaneError::serialization(path.display().to_string(), e))?;
    fs::write(&path, body)
        .await
        .map_err(|e| DataplaneError::io("write event meta", &path, e))?;

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ion_core::{
        Context, KeyValuePair,
        storage::{FilesystemBlobStore, FilesystemConfig, InMemoryDocumentStore},
    };
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        layout: SandboxLayout,
        blobs: FilesystemBlobStore,
        documents: InMemoryDocumentStore,
        blob_root: std::path::PathBuf,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let layout = SandboxLayout::new(temp_dir.path().join("sandbox"));
        layout.prepare().await.unwrap();

        let blob_root = temp_dir.path().join("blobs");
        let blobs = FilesystemBlobStore::new(FilesystemConfig {
            input_dir: blob_root.clone(),
            output_dir: blob_root.clone(),
        })
        .await
        .unwrap();
        let documents = InMemoryDocumentStore::open(temp_dir.path().join(".memdb"))
            .await
            .unwrap();

        Fixture {
            _temp_dir: temp_dir,
            layout,
            blobs,
            documents,
            blob_root,
        }
    }

    #[tokio::test]
    async fn root_event_gets_empty_event_meta() {
        let f = fixture().await;

        let meta = prepare(&f.layout, &f.blobs, &f.documents, "e0").await.unwrap();

        assert!(meta.is_none());
        let raw = std::fs::read(f.layout.in_event_meta_file()).unwrap();
        assert_eq!(raw, b"[]");
    }

    #[tokio::test]
    async fn fetches_files_and_writes_data() {
        let mut f = fixture().await;
        std::fs::write(f.blob_root.join("a.raw"), b"frames").unwrap();
        let data = KeyValuePairs::new().append(KeyValuePair::new("source", "camera"));
        f.documents
            .create_event_meta(&EventMeta {
                context: Context {
                    event_id: "e1".to_string(),
                    ..Default::default()
                },
                files: vec!["a.raw".to_string()],
                data: data.clone(),
                ..Default::default()
            })
            .await
            .unwrap();

        prepare(&f.layout, &f.blobs, &f.documents, "e1").await.unwrap();

        assert_eq!(std::fs::read(f.layout.in_data_dir().join("a.raw")).unwrap(), b"frames");
        let raw = std::fs::read(f.layout.in_event_meta_file()).unwrap();
        assert_eq!(serde_json::from_slice::<KeyValuePairs>(&raw).unwrap(), data);
    }

    #[tokio::test]
    async fn missing_input_blob_fails() {
        let mut f = fixture().await;
        f.documents
            .create_event_meta(&EventMeta {
                context: Context {
                    event_id: "e1".to_string(),
                    ..Default::default()
                },
                files: vec!["missing.raw".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        let err = prepare(&f.layout, &f.blobs, &f.documents, "e1").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
