use plugin_essentials::EssentialsHandler;
use plugin_system::{serve, ServeConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the handshake and protocol frames, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(anyhow::Error::msg)?;

    serve(ServeConfig::new(Arc::new(EssentialsHandler::new()))).await;
    Ok(())
}
