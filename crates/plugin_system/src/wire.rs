//! # Wire Format
//!
//! Messages between host and plugin are length-prefixed JSON frames:
//!
//! ```text
//! +----------------+---------------------------+
//! | length (u32 BE)| JSON body (length bytes)  |
//! +----------------+---------------------------+
//! ```
//!
//! The host sends [`HandleEventRequest`] frames and the plugin answers each
//! with exactly one [`HandleEventResponse`] carrying the same `request_id`.
//! Wire shapes mirror the Event Model field-for-field; conversions never
//! transform values.

use crate::error::PluginSystemError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use world_event_system::{EmitEvent, Event};

/// Largest frame body either side accepts (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    pub id: String,
    pub stream: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: i64,
    pub actor_kind: String,
    pub actor_id: String,
    pub payload: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEmitEvent {
    pub stream: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: String,
}

/// Host to plugin. `event` may be absent; the plugin still answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleEventRequest {
    pub request_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<WireEvent>,
}

/// Plugin to host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleEventResponse {
    pub request_id: u64,
    #[serde(default)]
    pub emit_events: Vec<WireEmitEvent>,
    /// Set when the handler failed; `emit_events` is then empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            stream: event.stream,
            event_type: event.event_type,
            timestamp: event.timestamp,
            actor_kind: event.actor_kind.into(),
            actor_id: event.actor_id,
            payload: event.payload,
        }
    }
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        Self {
            id: wire.id,
            stream: wire.stream,
            event_type: wire.event_type,
            timestamp: wire.timestamp,
            actor_kind: wire.actor_kind.into(),
            actor_id: wire.actor_id,
            payload: wire.payload,
        }
    }
}

impl From<EmitEvent> for WireEmitEvent {
    fn from(emit: EmitEvent) -> Self {
        Self {
            stream: emit.stream,
            event_type: emit.event_type,
            payload: emit.payload,
        }
    }
}

impl From<WireEmitEvent> for EmitEvent {
    fn from(wire: WireEmitEvent) -> Self {
        Self {
            stream: wire.stream,
            event_type: wire.event_type,
            payload: wire.payload,
        }
    }
}

// ============================================================================
// Framing
// ============================================================================

/// Reads one frame and decodes its body.
///
/// # Returns
///
/// `Ok(None)` on a clean end of stream before the length prefix, the decoded
/// message otherwise. A stream that ends inside a frame is an error.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, PluginSystemError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(PluginSystemError::Protocol(
                "stream ended inside a frame header".to_string(),
            ));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(PluginSystemError::Protocol(format!(
            "frame of {len} bytes exceeds limit of {MAX_FRAME_SIZE}"
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}

/// Encodes `message` and writes it as one frame, then flushes.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), PluginSystemError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(PluginSystemError::Protocol(format!(
            "frame of {} bytes exceeds limit of {MAX_FRAME_SIZE}",
            body.len()
        )));
    }

    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
