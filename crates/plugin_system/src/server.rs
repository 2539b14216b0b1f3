//! Plugin side of the boundary: the adapter between wire messages and a
//! [`Handler`], and the [`serve`] entry point plugin binaries call from
//! `main`.

use crate::error::PluginSystemError;
use crate::handler::{invoke_handler, Handler, HandlerError};
use crate::handshake::HandshakeConfig;
use crate::wire::{
    read_frame, write_frame, HandleEventRequest, HandleEventResponse, WireEmitEvent, WireEvent,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use world_event_system::Event;

/// Converts wire requests into handler calls and handler results back into
/// wire responses. Values are copied field-for-field in both directions.
#[derive(Clone)]
pub struct PluginServerAdapter {
    handler: Arc<dyn Handler>,
}

impl PluginServerAdapter {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self { handler }
    }

    /// Runs the handler for one wire event.
    ///
    /// An absent event is handled as an all-empty [`Event`], so the handler
    /// still runs and the caller still gets a well-formed answer.
    pub async fn handle_event(
        &self,
        event: Option<WireEvent>,
    ) -> Result<Vec<WireEmitEvent>, HandlerError> {
        let event = Event::from(event.unwrap_or_default());
        let emits = invoke_handler(self.handler.as_ref(), event).await?;
        Ok(emits.into_iter().map(WireEmitEvent::from).collect())
    }

    /// Answers one request. Handler failures are reported in the response
    /// `error` field with no emitted events.
    pub async fn handle_request(&self, request: HandleEventRequest) -> HandleEventResponse {
        let request_id = request.request_id;
        match self.handle_event(request.event).await {
            Ok(emit_events) => HandleEventResponse {
                request_id,
                emit_events,
                error: None,
            },
            Err(e) => {
                warn!(request_id, event_id = %e.event_id, error = %e, "handler failed");
                HandleEventResponse {
                    request_id,
                    emit_events: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Serves requests from `reader` until it reaches end of stream, writing one
/// response per request to `writer`. Requests are answered in order.
pub async fn serve_connection<R, W>(
    adapter: &PluginServerAdapter,
    mut reader: R,
    mut writer: W,
) -> Result<(), PluginSystemError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(request) = read_frame::<_, HandleEventRequest>(&mut reader).await? {
        debug!(request_id = request.request_id, "handling request");
        let response = adapter.handle_request(request).await;
        write_frame(&mut writer, &response).await?;
    }
    debug!("host closed the connection");
    Ok(())
}

/// Configuration for [`serve`].
#[derive(Clone, Default)]
pub struct ServeConfig {
    /// Required. [`serve`] panics when this is `None`.
    pub handler: Option<Arc<dyn Handler>>,
    pub handshake: HandshakeConfig,
}

impl ServeConfig {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler: Some(handler),
            handshake: HandshakeConfig::default(),
        }
    }
}

/// Runs a plugin process: validates the handshake environment, announces
/// readiness on stdout, then serves requests on stdin/stdout until the host
/// closes stdin.
///
/// Call this from `main`. Anything the plugin logs must go to stderr.
///
/// # Panics
///
/// If `config.handler` is `None`.
///
/// A handshake mismatch (missing or wrong magic cookie, no common protocol
/// version) prints the reason to stderr and exits the process with status 1.
pub async fn serve(config: ServeConfig) {
    let Some(handler) = config.handler else {
        panic!("plugin_system: ServeConfig.handler cannot be None");
    };

    if let Err(e) = config
        .handshake
        .validate_environment(|key| std::env::var(key).ok())
    {
        eprintln!("plugin handshake failed: {e}");
        std::process::exit(1);
    }

    let mut stdout = tokio::io::stdout();
    let line = format!("{}\n", config.handshake.handshake_line());
    if let Err(e) = stdout.write_all(line.as_bytes()).await {
        eprintln!("failed to write handshake: {e}");
        std::process::exit(1);
    }
    if let Err(e) = stdout.flush().await {
        eprintln!("failed to write handshake: {e}");
        std::process::exit(1);
    }

    info!("🔌 Plugin serving protocol v{}", config.handshake.protocol_version);

    let adapter = PluginServerAdapter::new(handler);
    if let Err(e) = serve_connection(&adapter, tokio::io::stdin(), stdout).await {
        warn!("plugin connection ended with error: {e}");
    }
}
