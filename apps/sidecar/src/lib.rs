//! Sidecar for ion modules.
//!
//! Runs next to one module execution. On `GET /ready` it materialises the
//! triggering event's input into the sandbox; on `GET /done` it uploads the
//! module's output blobs, stores insights and lineage metadata, and publishes
//! the events the module raised.

pub mod app;
pub mod committer;
pub mod config;
pub mod preparer;

pub use app::{ApiError, Dataplane, Phase, Sidecar};
pub use committer::{CommitSummary, Committer};
pub use config::{SidecarConfig, TriggerArgs};
