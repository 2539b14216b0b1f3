//! # Emitter
//!
//! Per-call accumulator for outbound events. Producers address events by
//! logical destination ([`Emitter::location`], [`Emitter::character`],
//! [`Emitter::global`]) and never deal with transport.
//!
//! Payload encoding failures do not fail the emitting call. The event is still
//! buffered with an empty-object payload (`{}`), and the failure is kept as an
//! [`EmitError`] that the owner of the request lifecycle collects at
//! [`Emitter::flush`]. When a [`DiagnosticSink`] is configured the failure is
//! also reported to it before the call returns.
//!
//! An `Emitter` has a single owner. Create one per unit of work and never
//! share it between concurrent tasks.

use crate::events::EmitEvent;
use crate::streams::StreamAddress;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;


/// Canonical payload for events whose payload could not be encoded.
const EMPTY_PAYLOAD: &str = "{}";

/// Key/value payload map. Keys are unique and encode in sorted order.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// A payload that could not be encoded, with the destination it was meant for.
#[derive(Debug, thiserror::Error)]
#[error("payload encoding failed: stream={stream} type={event_type}: {source}")]
pub struct EmitError {
    pub stream: String,
    pub event_type: String,
    #[source]
    pub source: serde_json::Error,
}

/// Receives payload encoding failures as they happen.
pub trait DiagnosticSink: Send + Sync {
    fn payload_encoding_failed(&self, stream: &str, event_type: &str, error: &str);
}

/// [`DiagnosticSink`] that reports through `tracing` at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn payload_encoding_failed(&self, stream: &str, event_type: &str, error: &str) {
        warn!(stream, event_type, error, "payload encoding failed");
    }
}

/// Accumulates [`EmitEvent`]s until drained by [`Emitter::flush`].
#[derive(Default)]
pub struct Emitter {
    events: Vec<EmitEvent>,
    errors: Vec<EmitError>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("events", &self.events.len())
            .field("errors", &self.errors.len())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Emitter {
    /// Creates an emitter with empty buffers and no diagnostic sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an emitter that also reports encoding failures to `sink`.
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::default()
        }
    }

    /// Creates an emitter that reports encoding failures through `tracing`.
    pub fn with_tracing() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    /// Emits to `location:<location_id>`.
    pub fn location<P>(&mut self, location_id: &str, event_type: &str, payload: &P)
    where
        P: Serialize + ?Sized,
    {
        self.emit(StreamAddress::Location(location_id.to_string()), event_type, payload);
    }

    /// Emits to `character:<character_id>`.
    pub fn character<P>(&mut self, character_id: &str, event_type: &str, payload: &P)
    where
        P: Serialize + ?Sized,
    {
        self.emit(StreamAddress::Character(character_id.to_string()), event_type, payload);
    }

    /// Emits to the `global` stream.
    pub fn global<P>(&mut self, event_type: &str, payload: &P)
    where
        P: Serialize + ?Sized,
    {
        self.emit(StreamAddress::Global, event_type, payload);
    }

    /// Returns all buffered events and encoding errors, leaving the emitter
    /// empty and ready for reuse. Both vectors are empty if nothing was
    /// emitted since the last flush.
    pub fn flush(&mut self) -> (Vec<EmitEvent>, Vec<EmitError>) {
        (std::mem::take(&mut self.events), std::mem::take(&mut self.errors))
    }

    /// True if any payload failed to encode since the last flush.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of payload encoding failures since the last flush.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    fn emit<P>(&mut self, address: StreamAddress, event_type: &str, payload: &P)
    where
        P: Serialize + ?Sized,
    {
        let stream = address.to_string();
        let payload = match serde_json::to_string(payload) {
            Ok(encoded) => encoded,
            Err(source) => {
                if let Some(sink) = &self.sink {
                    sink.payload_encoding_failed(&stream, event_type, &source.to_string());
                }
                self.errors.push(EmitError {
                    stream: stream.clone(),
                    event_type: event_type.to_string(),
                    source,
                });
                EMPTY_PAYLOAD.to_string()
            }
        };

        self.events.push(EmitEvent {
            stream,
            event_type: event_type.to_string(),
            payload,
        });
    }
}
