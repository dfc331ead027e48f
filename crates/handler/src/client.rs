use ion_core::{DataplaneError, Result};
use reqwest::StatusCode;
use tracing::debug;

pub const READY_PATH: &str = "/ready";
pub const DONE_PATH: &str = "/done";

/// Blocking-style round trips to the sidecar's control surface. No retries:
/// any failure is returned as a `Protocol` error.
#[derive(Clone)]
pub struct SidecarClient {
    http: reqwest::Client,
    base_url: String,
}

impl SidecarClient {
    pub fn new(port: u16) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://127.0.0.1:{port}"),
        }
    }

    pub async fn ready(&self) -> Result<()> {
        self.call(READY_PATH).await
    }

    pub async fn done(&self) -> Result<()> {
        self.call(DONE_PATH).await
    }

    async fn call(&self, path: &str) -> Result<()> {
        let endpoint = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| DataplaneError::Protocol {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(DataplaneError::Protocol {
                endpoint,
                reason: format!("status {status}: {body}"),
            });
        }

        debug!(endpoint = %endpoint, "sidecar acknowledged");
        Ok(())
    }
}
