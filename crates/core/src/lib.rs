//! Ion Core Library
//!
//! Shared dataplane pieces for ion modules and their sidecars: the event
//! model, sandbox directory conventions and pluggable blob/document storage.

pub mod error;
pub mod events;
pub mod sandbox;
pub mod storage;
pub mod telemetry;

// Re-export commonly used items at crate root
pub use error::{DataplaneError, Result};
pub use events::{Context, Event, EventMeta, EventPublisher, Insight, KeyValuePair, KeyValuePairs};
pub use sandbox::{DEFAULT_BASE_DIR, SandboxLayout};
pub use storage::{BlobStore, BlobStoreConfig, DocumentStore, DocumentStoreConfig};
