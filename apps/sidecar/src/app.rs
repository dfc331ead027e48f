use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use ion_core::{BlobStore, DataplaneError, DocumentStore, EventPublisher};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{Mutex, Notify},
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{committer::Committer, config::SidecarConfig, preparer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    New,
    Ready,
    Done,
}

/// The external providers an execution reads from and commits to.
pub struct Dataplane {
    pub blobs: Box<dyn BlobStore>,
    pub documents: Box<dyn DocumentStore>,
    pub publisher: Box<dyn EventPublisher>,
}

impl Dataplane {
    /// Close every provider, returning the first failure after trying all.
    pub async fn close(&mut self) -> ion_core::Result<()> {
        let results = [
            self.publisher.close().await,
            self.documents.close().await,
            self.blobs.close().await,
        ];
        results.into_iter().collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{endpoint} called whilst sidecar is in the {phase:?} state")]
    WrongState { endpoint: &'static str, phase: Phase },

    #[error(transparent)]
    Failed(#[from] DataplaneError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::WrongState { .. } => StatusCode::BAD_REQUEST,
            ApiError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            status_code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

struct Inner {
    phase: Phase,
    dataplane: Dataplane,
}

/// Serves one module execution: `/ready` once, `/done` once, then stops.
pub struct Sidecar {
    config: SidecarConfig,
    execution_id: String,
    inner: Mutex<Inner>,
    finished: Notify,
}

impl Sidecar {
    pub fn new(config: SidecarConfig, dataplane: Dataplane) -> Arc<Self> {
        Arc::new(Self {
            config,
            execution_id: uuid::Uuid::new_v4().to_string(),
            inner: Mutex::new(Inner {
                phase: Phase::New,
                dataplane,
            }),
            finished: Notify::new(),
        })
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub async fn phase(&self) -> Phase {
        self.inner.lock().await.phase
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/ready", get(on_ready))
            .route("/done", get(on_done))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(self))
    }

    /// Serve until `/done` succeeds, then drain in-flight requests and return.
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        let context = &self.config.trigger.context;
        info!(
            execution_id = %self.execution_id,
            event_id = %context.event_id,
            correlation_id = %context.correlation_id,
            name = %context.name,
            addr = ?listener.local_addr().ok(),
            "sidecar listening"
        );

        let sidecar = Arc::clone(self);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { sidecar.finished.notified().await })
            .await
    }

    /// Release the providers and remove the sandbox tree. The in-memory
    /// document store persists its snapshot here.
    pub async fn close(&self) -> ion_core::Result<()> {
        let mut inner = self.inner.lock().await;
        let closed = inner.dataplane.close().await;
        self.config.layout.clear().await?;
        closed
    }

    async fn ready(&self) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().await;
        if inner.phase != Phase::New {
            return Err(ApiError::WrongState {
                endpoint: "/ready",
                phase: inner.phase,
            });
        }

        let context = &self.config.trigger.context;
        info!(
            execution_id = %self.execution_id,
            event_id = %context.event_id,
            correlation_id = %context.correlation_id,
            name = %context.name,
            "ready called, preparing module input"
        );

        self.config.layout.prepare().await?;
        let dataplane = &inner.dataplane;
        preparer::prepare(
            &self.config.layout,
            dataplane.blobs.as_ref(),
            dataplane.documents.as_ref(),
            &context.event_id,
        )
        .await?;

        inner.phase = Phase::Ready;
        info!(execution_id = %self.execution_id, "module input prepared");
        Ok(())
    }

    async fn done(&self) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().await;
        if inner.phase != Phase::Ready {
            return Err(ApiError::WrongState {
                endpoint: "/done",
                phase: inner.phase,
            });
        }

        let context = &self.config.trigger.context;
        info!(
            execution_id = %self.execution_id,
            event_id = %context.event_id,
            correlation_id = %context.correlation_id,
            name = %context.name,
            "done called, committing module output"
        );

        let committer = Committer {
            layout: &self.config.layout,
            trigger: &self.config.trigger,
            execution_id: &self.execution_id,
            valid_event_types: &self.config.valid_event_types,
        };
        let Dataplane {
            blobs,
            documents,
            publisher,
        } = &mut inner.dataplane;
        let summary = committer
            .commit(blobs.as_ref(), documents.as_mut(), publisher.as_ref())
            .await?;

        inner.phase = Phase::Done;
        info!(
            execution_id = %self.execution_id,
            blobs = summary.blobs,
            events = summary.events.len(),
            insight = summary.insight,
            "module output committed"
        );
        self.finished.notify_one();
        Ok(())
    }
}

async fn on_ready(State(sidecar): State<Arc<Sidecar>>) -> Result<StatusCode, ApiError> {
    sidecar.ready().await.inspect_err(log_failure)?;
    Ok(StatusCode::OK)
}

async fn on_done(State(sidecar): State<Arc<Sidecar>>) -> Result<StatusCode, ApiError> {
    sidecar.done().await.inspect_err(log_failure)?;
    Ok(StatusCode::OK)
}

fn log_failure(err: &ApiError) {
    match err {
        ApiError::WrongState { .. } => warn!(error = %err, "rejected out of order call"),
        ApiError::Failed(e) => error!(error = %e, "module step failed"),
    }
}
