use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataplaneError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("Serialization failed for {target}: {reason}")]
    Serialization { target: String, reason: String },

    #[error("IO error during {op} on {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend error during {op} for {id}: {reason}")]
    Backend {
        op: &'static str,
        id: String,
        reason: String,
    },

    #[error("Control surface call to {endpoint} failed: {reason}")]
    Protocol { endpoint: String, reason: String },

    #[error("Invalid event in {file}: {reason}")]
    InvalidEvent { file: String, reason: String },

    #[error("Index {index} out of bounds for {len} key value pairs")]
    InvalidIndex { index: usize, len: usize },

    #[error("{what} may only be written once per execution")]
    AlreadyWritten { what: &'static str },
}

impl DataplaneError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataplaneError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn serialization(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DataplaneError::Serialization {
            target: target.into(),
            reason: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DataplaneError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, DataplaneError>;
