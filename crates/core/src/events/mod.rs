pub mod bus;
pub mod bus_builder;
pub mod event;
pub mod kvp;
pub mod metadata;
pub mod publisher;

pub use bus::*;
pub use bus_builder::*;
pub use event::*;
pub use kvp::*;
pub use metadata::*;
pub use publisher::*;

/// Key of the event type pair in an `out/events` file
pub const EVENT_TYPE_KEY: &str = "eventType";
/// Key of the comma-joined output file names in an `out/events` file
pub const FILES_KEY: &str = "files";
