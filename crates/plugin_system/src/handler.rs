//! # Handler
//!
//! The one interface a plugin author implements. A handler receives a single
//! [`Event`] and answers with zero or more [`EmitEvent`]s or an error. It
//! knows nothing about processes, transports or versions.
//!
//! ```rust
//! use async_trait::async_trait;
//! use plugin_system::{BoxError, Handler};
//! use world_event_system::{EmitEvent, Event};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Handler for Echo {
//!     async fn handle_event(&self, event: Event) -> Result<Vec<EmitEvent>, BoxError> {
//!         Ok(vec![EmitEvent::new(event.stream, event.event_type, event.payload)])
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use world_event_system::{EmitEvent, Event};

/// Error type handlers return. `anyhow::Error` and any `std::error::Error`
/// convert into it with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Event handling capability shared by in-process and remote plugins.
///
/// Cancellation is cooperative: callers drop the returned future (for
/// example on timeout) and implementations must tolerate that.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<Vec<EmitEvent>, BoxError>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle_event(&self, event: Event) -> Result<Vec<EmitEvent>, BoxError> {
        (**self).handle_event(event).await
    }
}

/// A failure that originated in handler logic rather than in the framework
/// or the transport.
#[derive(Debug, Error)]
#[error("handler error: {source}")]
pub struct HandlerError {
    /// Event that was being handled (empty when the event was absent)
    pub event_id: String,
    #[source]
    pub source: BoxError,
}

impl HandlerError {
    pub fn new(event_id: impl Into<String>, source: BoxError) -> Self {
        Self {
            event_id: event_id.into(),
            source,
        }
    }
}

/// Runs a handler and wraps any failure in [`HandlerError`].
pub async fn invoke_handler(
    handler: &dyn Handler,
    event: Event,
) -> Result<Vec<EmitEvent>, HandlerError> {
    let event_id = event.id.clone();
    handler
        .handle_event(event)
        .await
        .map_err(|source| HandlerError::new(event_id, source))
}

/// In-process plugin: a [`Handler`] registered directly with the host.
///
/// Handler failures are wrapped exactly as the out-of-process adapter wraps
/// them, so callers cannot tell a local plugin from a remote one.
pub struct LocalPlugin {
    handler: Arc<dyn Handler>,
}

impl LocalPlugin {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl Handler for LocalPlugin {
    async fn handle_event(&self, event: Event) -> Result<Vec<EmitEvent>, BoxError> {
        invoke_handler(self.handler.as_ref(), event)
            .await
            .map_err(Into::into)
    }
}
