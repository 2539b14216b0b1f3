//! Host side stub for a remote plugin.
//!
//! A connection is driven by two tasks. The writer task owns the write half
//! and sends queued requests one frame at a time. The reader task owns the
//! read half, decodes every response and hands it to the call waiting on its
//! request id. Callers never touch the byte stream, so dropping a call (for
//! example on timeout) cannot leave a frame half read or half written.

use crate::error::PluginSystemError;
use crate::handler::{BoxError, Handler};
use crate::wire::{read_frame, write_frame, HandleEventRequest, HandleEventResponse, WireEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use world_event_system::{EmitEvent, Event};

#[derive(Default)]
struct ConnectionState {
    pending: HashMap<u64, oneshot::Sender<HandleEventResponse>>,
    /// Set once the connection is gone. Later calls fail with this reason.
    closed: Option<String>,
}

struct Shared {
    name: String,
    state: Mutex<ConnectionState>,
}

impl Shared {
    fn state(&self) -> std::sync::MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the connection closed and wakes every waiting call.
    fn close(&self, reason: String) {
        let mut state = self.state();
        if state.closed.is_none() {
            debug!(plugin = %self.name, reason = %reason, "plugin connection closed");
            state.closed = Some(reason);
        }
        state.pending.clear();
    }

    fn closed_error(&self) -> PluginSystemError {
        let reason = self
            .state()
            .closed
            .clone()
            .unwrap_or_else(|| format!("plugin {} closed the connection", self.name));
        PluginSystemError::Protocol(reason)
    }

    fn dispatch(&self, response: HandleEventResponse) {
        let waiter = self.state().pending.remove(&response.request_id);
        match waiter {
            // The caller may have given up in the meantime
            Some(waiter) => {
                let _ = waiter.send(response);
            }
            None => debug!(
                plugin = %self.name,
                stale_id = response.request_id,
                "discarding stale response"
            ),
        }
    }
}

/// Removes a pending entry when its call finishes or is dropped.
struct PendingGuard<'a> {
    shared: &'a Shared,
    request_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.state().pending.remove(&self.request_id);
    }
}

/// Calls [`Handler::handle_event`] on a plugin at the other end of a
/// connection as if it were local.
///
/// Responses are matched to calls by request id. A call dropped before its
/// answer arrives leaves a stale response behind, which is discarded when it
/// shows up; the connection stays usable.
pub struct PluginClient {
    shared: Arc<Shared>,
    requests: mpsc::UnboundedSender<HandleEventRequest>,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl PluginClient {
    /// Wraps a connection to a plugin that has completed its handshake.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R, W>(name: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared {
            name: name.into(),
            state: Mutex::new(ConnectionState::default()),
        });
        let (requests, queued) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(read_responses(Arc::clone(&shared), reader));
        let writer_task = tokio::spawn(write_requests(Arc::clone(&shared), writer, queued));

        Self {
            shared,
            requests,
            next_id: AtomicU64::new(1),
            reader_task,
            writer_task,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Sends one event and waits for the matching response.
    ///
    /// # Returns
    ///
    /// The emitted events, [`PluginSystemError::Handler`] if the plugin's
    /// handler failed, or a protocol error once the connection is gone.
    pub async fn call(&self, event: Event) -> Result<Vec<EmitEvent>, PluginSystemError> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (waiter, response) = oneshot::channel();
        {
            let mut state = self.shared.state();
            if let Some(reason) = &state.closed {
                return Err(PluginSystemError::Protocol(reason.clone()));
            }
            state.pending.insert(request_id, waiter);
        }
        let _pending = PendingGuard {
            shared: &self.shared,
            request_id,
        };

        let request = HandleEventRequest {
            request_id,
            event: Some(WireEvent::from(event)),
        };
        if self.requests.send(request).is_err() {
            return Err(self.shared.closed_error());
        }

        let response = response.await.map_err(|_| self.shared.closed_error())?;
        if let Some(error) = response.error {
            return Err(PluginSystemError::Handler(error));
        }
        Ok(response.emit_events.into_iter().map(EmitEvent::from).collect())
    }
}

impl Drop for PluginClient {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

#[async_trait]
impl Handler for PluginClient {
    async fn handle_event(&self, event: Event) -> Result<Vec<EmitEvent>, BoxError> {
        self.call(event).await.map_err(Into::into)
    }
}

async fn read_responses<R>(shared: Arc<Shared>, mut reader: R)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame::<_, HandleEventResponse>(&mut reader).await {
            Ok(Some(response)) => shared.dispatch(response),
            Ok(None) => {
                shared.close(format!("plugin {} closed the connection", shared.name));
                return;
            }
            Err(e) => {
                warn!(plugin = %shared.name, error = %e, "plugin connection failed");
                shared.close(format!("connection to {} failed: {e}", shared.name));
                return;
            }
        }
    }
}

async fn write_requests<W>(
    shared: Arc<Shared>,
    mut writer: W,
    mut queued: mpsc::UnboundedReceiver<HandleEventRequest>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(request) = queued.recv().await {
        if let Err(e) = write_frame(&mut writer, &request).await {
            warn!(plugin = %shared.name, error = %e, "failed to send request to plugin");
            shared.close(format!("connection to {} failed: {e}", shared.name));
            return;
        }
    }
}
