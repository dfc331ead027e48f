//! Directory conventions shared by a module and its sidecar.
//!
//! ```text
//! <base>/in/data/            input blobs, read-only to the module
//! <base>/in/eventmeta.json   metadata of the triggering event
//! <base>/out/data/           blobs produced by the module
//! <base>/out/events/         one event-<n>.json per raised event
//! <base>/out/insights.json   insights, written at most once
//! ```

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{DataplaneError, Result};

pub const DEFAULT_BASE_DIR: &str = "/ion";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLayout {
    base_dir: PathBuf,
}

impl Default for SandboxLayout {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DIR)
    }
}

impl SandboxLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn in_data_dir(&self) -> PathBuf {
        self.base_dir.join("in").join("data")
    }

    pub fn in_event_meta_file(&self) -> PathBuf {
        self.base_dir.join("in").join("eventmeta.json")
    }

    pub fn out_data_dir(&self) -> PathBuf {
        self.base_dir.join("out").join("data")
    }

    pub fn out_events_dir(&self) -> PathBuf {
        self.base_dir.join("out").join("events")
    }

    pub fn out_insights_file(&self) -> PathBuf {
        self.base_dir.join("out").join("insights.json")
    }

    pub fn event_file(&self, n: usize) -> PathBuf {
        self.out_events_dir().join(format!("event-{n}.json"))
    }

    /// Create an empty tree, wiping whatever a previous execution left behind.
    pub async fn prepare(&self) -> Result<()> {
        for dir in [
            self.in_data_dir(),
            self.out_data_dir(),
            self.out_events_dir(),
        ] {
            create_dir_clean(&dir).await?;
        }
        for file in [self.in_event_meta_file(), self.out_insights_file()] {
            remove_file_if_exists(&file).await?;
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        for dir in [self.base_dir.join("in"), self.base_dir.join("out")] {
            remove_dir_if_exists(&dir).await?;
        }
        Ok(())
    }
}

async fn create_dir_clean(dir: &Path) -> Result<()> {
    remove_dir_if_exists(dir).await?;
    fs::create_dir_all(dir)
        .await
        .map_err(|e| DataplaneError::io("create dir", dir, e))
}

async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DataplaneError::io("remove dir", dir, e)),
    }
}

async fn remove_file_if_exists(file: &Path) -> Result<()> {
    match fs::remove_file(file).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DataplaneError::io("remove file", file, e)),
    }
}
