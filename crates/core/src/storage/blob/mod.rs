pub mod filesystem;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

use crate::error::Result;

pub use filesystem::{FilesystemBlobStore, FilesystemConfig};

/// Stores and retrieves file payloads. Modules only ever name blobs
/// relatively; resolving names to locations belongs to the backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Copy each source file, under its base name, into the store's output
    /// location. Returns source path -> destination URI. Any failure aborts
    /// the whole call and nothing is reported as stored.
    async fn put_blobs(&self, source_paths: &[PathBuf]) -> Result<HashMap<PathBuf, String>>;

    /// Copy each named blob from the store's input location into `output_dir`,
    /// keeping its relative name.
    async fn get_blobs(&self, output_dir: &Path, names: &[String]) -> Result<()>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum BlobStoreConfig {
    Filesystem(FilesystemConfig),
}

impl BlobStoreConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BlobStoreConfig::Filesystem(_) => "filesystem",
        }
    }

    pub async fn open(self) -> Result<Box<dyn BlobStore>> {
        match self {
            BlobStoreConfig::Filesystem(cfg) => Ok(Box::new(FilesystemBlobStore::new(cfg).await?)),
        }
    }
}
