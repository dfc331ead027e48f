use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};

use crate::{
    error::{DataplaneError, Result},
    storage::blob::BlobStore,
};

#[derive(Debug, Clone)]
pub struct FilesystemConfig {
    /// Root blobs are fetched from
    pub input_dir: PathBuf,
    /// Root blobs are stored under
    pub output_dir: PathBuf,
}

/// Blob store backed by two local directories.
pub struct FilesystemBlobStore {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl FilesystemBlobStore {
    pub async fn new(config: FilesystemConfig) -> Result<Self> {
        fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|e| DataplaneError::io("create blob output root", &config.output_dir, e))?;

        Ok(Self {
            input_dir: config.input_dir,
            output_dir: config.output_dir,
        })
    }

    async fn rollback(&self, stored: &HashMap<PathBuf, String>) {
        for uri in stored.values() {
            if let Err(e) = fs::remove_file(uri).await {
                warn!(uri = %uri, error = %e, "failed to roll back stored blob");
            }
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_blobs(&self, source_paths: &[PathBuf]) -> Result<HashMap<PathBuf, String>> {
        let mut uris = HashMap::with_capacity(source_paths.len());

        for source in source_paths {
            let Some(file_name) = source.file_name() else {
                self.rollback(&uris).await;
                return Err(DataplaneError::io(
                    "put blob",
                    source,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                ));
            };
            let destination = self.output_dir.join(file_name);

            if let Err(e) = copy_file(source, &destination).await {
                self.rollback(&uris).await;
                return Err(e);
            }

            debug!(source = %source.display(), destination = %destination.display(), "blob stored");
            uris.insert(source.clone(), destination.display().to_string());
        }

        Ok(uris)
    }

    async fn get_blobs(&self, output_dir: &Path, names: &[String]) -> Result<()> {
        for name in names {
            let source = self.input_dir.join(name);
            if !fs::try_exists(&source)
                .await
                .map_err(|e| DataplaneError::io("stat blob", &source, e))?
            {
                return Err(DataplaneError::NotFound {
                    what: "blob",
                    id: name.clone(),
                });
            }

            let destination = output_dir.join(name);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DataplaneError::io("create blob dir", parent, e))?;
            }
            copy_file(&source, &destination).await?;
            debug!(name = %name, destination = %destination.display(), "blob fetched");
        }

        Ok(())
    }
}

/// Byte-for-byte copy. The destination is flushed and synced before success
/// is reported; a copy that fails after the destination was created removes it.
async fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    let mut src = File::open(source)
        .await
        .map_err(|e| DataplaneError::io("open blob source", source, e))?;
    let mut dst = File::create(destination)
        .await
        .map_err(|e| DataplaneError::io("create blob destination", destination, e))?;

    let written = async {
        tokio::io::copy(&mut src, &mut dst)
            .await
            .map_err(|e| DataplaneError::io("copy blob", source, e))?;
        dst.flush()
            .await
            .map_err(|e| DataplaneError::io("flush blob", destination, e))?;
        dst.sync_all()
            .await
            .map_err(|e| DataplaneError::io("sync blob", destination, e))
    }
    .await;

    if written.is_err() {
        drop(dst);
        if let Err(e) = fs::remove_file(destination).await {
            warn!(destination = %destination.display(), error = %e, "failed to remove partial blob");
        }
    }
    written
}
