//! Module-side half of the ion dataplane.
//!
//! A module builds a [`Handler`] from a [`HandlerConfig`], calls
//! [`Handler::ready`], reads its input from the sandbox, writes blobs, events
//! and insights, then calls [`Handler::done`]. Errors from any of these steps
//! are fatal to the module.

pub mod client;
pub mod config;
pub mod handler;

pub use client::SidecarClient;
pub use config::HandlerConfig;
pub use handler::{Handler, OutputEvent};
