pub mod blob;
pub mod document;

pub use blob::{BlobStore, BlobStoreConfig, FilesystemBlobStore, FilesystemConfig};
pub use document::{
    DEFAULT_SNAPSHOT_PATH, DocumentStore, DocumentStoreConfig, InMemoryDocumentStore, MongoConfig,
    MongoDocumentStore,
};
