//! Broadcast side of the host: receives what plugins emit.
//!
//! Session delivery lives outside this process, so the host validates each
//! emitted event and records it in the log stream.

use async_trait::async_trait;
use plugin_system::{BoxError, EmitEvent, EventSink};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::info;
use world_event_system::StreamAddress;

/// Reasons an emitted event is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("unroutable stream: {0:?}")]
    UnroutableStream(String),
    #[error("event type cannot be empty (stream {0})")]
    MissingEventType(String),
    #[error("payload is not valid JSON on {stream}: {reason}")]
    InvalidPayload { stream: String, reason: String },
}

/// Validates plugin output and logs it as a broadcast.
#[derive(Debug, Default)]
pub struct LogBroadcastSink {
    published: AtomicU64,
    rejected: AtomicU64,
}

impl LogBroadcastSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Checks that `event` is addressed to a known stream family and carries
    /// a JSON payload.
    pub fn check(event: &EmitEvent) -> Result<StreamAddress, BroadcastError> {
        let address = StreamAddress::parse(&event.stream);
        if let StreamAddress::Other(raw) = address {
            return Err(BroadcastError::UnroutableStream(raw));
        }
        if event.event_type.is_empty() {
            return Err(BroadcastError::MissingEventType(event.stream.clone()));
        }
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&event.payload) {
            return Err(BroadcastError::InvalidPayload {
                stream: event.stream.clone(),
                reason: e.to_string(),
            });
        }
        Ok(address)
    }
}

#[async_trait]
impl EventSink for LogBroadcastSink {
    async fn emit_plugin_event(&self, plugin: &str, event: EmitEvent) -> Result<(), BoxError> {
        match Self::check(&event) {
            Ok(address) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                info!(
                    plugin = %plugin,
                    stream = %address,
                    event_type = %event.event_type,
                    payload = %event.payload,
                    "📣 broadcast"
                );
                Ok(())
            }
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }
}
