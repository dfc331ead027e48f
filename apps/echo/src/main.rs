//! Minimal ion module: copies every input blob to `out/data/<name>.echo` and
//! raises one event listing the copies.

use anyhow::{Context as _, Result};
use ion_core::{KeyValuePair, KeyValuePairs, telemetry};
use ion_handler::{Handler, HandlerConfig, OutputEvent};
use tracing::info;

const EVENT_TYPE_ENV: &str = "ECHO_EVENT_TYPE";
const DEFAULT_EVENT_TYPE: &str = "files_echoed";

/// One module execution. Any error is fatal and must end the process.
async fn run(mut handler: Handler, event_type: &str) -> Result<usize> {
    handler.ready().await?;

    let meta = handler.read_event_meta().await?;
    info!(pairs = meta.len(), "read event meta");

    let mut event = OutputEvent::new(event_type);
    for kvp in &meta {
        event = event.with_pair(format!("in.{}", kvp.key), &kvp.value);
    }

    let inputs = handler.input_files().await?;
    for input in &inputs {
        let Some(name) = input.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let echo_name = format!("{name}.echo");
        tokio::fs::copy(input, handler.output_path(&echo_name))
            .await
            .with_context(|| format!("echoing {}", input.display()))?;
        event = event.with_file(echo_name);
    }

    handler
        .write_insights(
            &KeyValuePairs::new().append(KeyValuePair::new("filesEchoed", inputs.len().to_string())),
        )
        .await?;
    handler.raise_event(&event).await?;
    handler.done().await?;

    Ok(inputs.len())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = HandlerConfig::from_env();
    telemetry::init(config.debug);

    let event_type =
        std::env::var(EVENT_TYPE_ENV).unwrap_or_else(|_| DEFAULT_EVENT_TYPE.to_string());
    let echoed = run(Handler::new(config), &event_type).await?;

    info!(echoed, "echo finished");
    Ok(())
}
