use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use ion_core::{
    BlobStoreConfig, DEFAULT_BASE_DIR, DocumentStoreConfig, Event, SandboxLayout,
    events::DirectoryPublisher,
    storage::{DEFAULT_SNAPSHOT_PATH, FilesystemConfig, MongoConfig},
    telemetry,
};
use ion_sidecar::{
    Dataplane, Sidecar, SidecarConfig, TriggerArgs,
    config::{control_addr, split_list},
};
use tokio::net::TcpListener;
use tracing::info;

/// CLI wrapper for the blob backends (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliBlobBackend {
    #[default]
    Filesystem,
}

#[derive(Clone, Default, ValueEnum)]
enum CliDocumentBackend {
    #[default]
    Memory,
    Mongo,
}

#[derive(Parser)]
#[command(name = "ion-sidecar")]
#[command(about = "Prepare input for an ion module, then commit its output when it is done")]
struct Cli {
    /// Module type being run; recorded as a stage on every event it raises
    #[arg(long, env = "SIDECAR_MODULE_NAME")]
    module_name: String,

    /// Id of the event that triggered this execution
    #[arg(long, env = "SIDECAR_EVENT_ID")]
    event_id: String,

    /// Type of the triggering event
    #[arg(long, env = "SIDECAR_EVENT_TYPE", default_value = "")]
    event_type: String,

    /// Correlation id of the lineage. Defaults to the event id.
    #[arg(long, env = "SIDECAR_CORRELATION_ID", default_value = "")]
    correlation_id: String,

    #[arg(long, env = "SIDECAR_PARENT_EVENT_ID", default_value = "")]
    parent_event_id: String,

    /// Comma separated module types already run on this lineage, oldest first
    #[arg(long, env = "SIDECAR_PREVIOUS_STAGES", default_value = "")]
    previous_stages: String,

    /// Comma separated event types the module may raise. Empty allows any.
    #[arg(long, env = "SIDECAR_VALID_EVENT_TYPES", default_value = "")]
    valid_event_types: String,

    /// Root of the sandbox shared with the module
    #[arg(long, env = "ION_BASE_DIR", default_value = DEFAULT_BASE_DIR)]
    base_dir: PathBuf,

    #[arg(short, long, env = "SIDECAR_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "SIDECAR_BLOB_BACKEND", default_value = "filesystem")]
    blob_backend: CliBlobBackend,

    /// Directory input blobs are fetched from
    #[arg(long, env = "SIDECAR_BLOB_INPUT_DIR", default_value = "blobs")]
    blob_input_dir: PathBuf,

    /// Directory output blobs are stored in
    #[arg(long, env = "SIDECAR_BLOB_OUTPUT_DIR", default_value = "blobs")]
    blob_output_dir: PathBuf,

    #[arg(long, env = "SIDECAR_DOCUMENT_BACKEND", default_value = "memory")]
    document_backend: CliDocumentBackend,

    /// Snapshot file of the in-memory document store
    #[arg(long, env = "SIDECAR_MEMDB_PATH", default_value = DEFAULT_SNAPSHOT_PATH)]
    memdb_path: PathBuf,

    #[arg(long, env = "SIDECAR_MONGO_URI", default_value = "mongodb://localhost:27017")]
    mongo_uri: String,

    #[arg(long, env = "SIDECAR_MONGO_DATABASE", default_value = "ion")]
    mongo_database: String,

    #[arg(long, env = "SIDECAR_MONGO_EVENT_META_COLLECTION", default_value = "eventmeta")]
    mongo_event_meta_collection: String,

    #[arg(long, env = "SIDECAR_MONGO_INSIGHT_COLLECTION", default_value = "insights")]
    mongo_insight_collection: String,

    #[arg(long, env = "SIDECAR_MONGO_TLS")]
    mongo_tls: bool,

    /// Directory published events are written to
    #[arg(long, env = "SIDECAR_EVENTS_DIR", default_value = "events")]
    events_dir: PathBuf,

    #[arg(long, env = "SIDECAR_DEBUG")]
    debug: bool,
}

impl Cli {
    fn blob_config(&self) -> BlobStoreConfig {
        match self.blob_backend {
            CliBlobBackend::Filesystem => BlobStoreConfig::Filesystem(FilesystemConfig {
                input_dir: self.blob_input_dir.clone(),
                output_dir: self.blob_output_dir.clone(),
            }),
        }
    }

    fn document_config(&self) -> DocumentStoreConfig {
        match self.document_backend {
            CliDocumentBackend::Memory => DocumentStoreConfig::Memory {
                snapshot_path: self.memdb_path.clone(),
            },
            CliDocumentBackend::Mongo => DocumentStoreConfig::Mongo(MongoConfig {
                uri: self.mongo_uri.clone(),
                database: self.mongo_database.clone(),
                event_meta_collection: self.mongo_event_meta_collection.clone(),
                insight_collection: self.mongo_insight_collection.clone(),
                tls: self.mongo_tls,
            }),
        }
    }

    fn sidecar_config(&self) -> SidecarConfig {
        let trigger: Event = TriggerArgs {
            name: self.module_name.clone(),
            event_id: self.event_id.clone(),
            event_type: self.event_type.clone(),
            correlation_id: self.correlation_id.clone(),
            parent_event_id: self.parent_event_id.clone(),
            previous_stages: split_list(&self.previous_stages),
        }
        .into();

        SidecarConfig::new(SandboxLayout::new(&self.base_dir), trigger)
            .with_valid_event_types(split_list(&self.valid_event_types))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.debug);

    let blob_config = cli.blob_config();
    let document_config = cli.document_config();
    info!(
        blobs = blob_config.name(),
        documents = document_config.name(),
        "opening providers"
    );

    let dataplane = Dataplane {
        blobs: blob_config.open().await.context("opening blob store")?,
        documents: document_config
            .open()
            .await
            .context("opening document store")?,
        publisher: Box::new(
            DirectoryPublisher::new(&cli.events_dir)
                .await
                .context("opening event publisher")?,
        ),
    };

    let sidecar = Sidecar::new(cli.sidecar_config(), dataplane);
    let listener = TcpListener::bind(control_addr(cli.port))
        .await
        .with_context(|| format!("binding port {}", cli.port))?;

    let served = sidecar.serve(listener).await;
    sidecar.close().await.context("closing sidecar")?;
    served.context("serving control surface")?;

    info!(execution_id = sidecar.execution_id(), "sidecar finished");
    Ok(())
}
