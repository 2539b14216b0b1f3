//! # Event Model
//!
//! Plain data records exchanged between the host and event handlers.
//!
//! - [`Event`] describes something that already happened in the world and is
//!   delivered to handlers.
//! - [`EmitEvent`] describes an event a handler wants published. It is
//!   consumed exactly once by whoever drains it (an [`Emitter`](crate::Emitter)
//!   flush or the plugin boundary adapter).
//!
//! Payloads are opaque, already-serialized JSON text. This layer never
//! interprets them beyond the optional [`Event::decode_payload`] helper.

use crate::utils::{current_timestamp_millis, new_event_id};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known event types. Any other string is a valid event type as well.
pub mod event_types {
    /// Spoken text in a location.
    pub const SAY: &str = "say";
    /// Emoted action in a location.
    pub const POSE: &str = "pose";
    /// A character entered a location.
    pub const ARRIVE: &str = "arrive";
    /// A character left a location.
    pub const LEAVE: &str = "leave";
    /// Server or plugin notices.
    pub const SYSTEM: &str = "system";
    /// A parsed player command routed to plugins.
    pub const COMMAND: &str = "command";
}

// ============================================================================
// Actor Kind
// ============================================================================

/// Identifies what kind of entity caused an event.
///
/// The wire representation is a plain string. Values outside the known set are
/// kept verbatim in [`ActorKind::Other`] so that they survive a round trip
/// through the plugin boundary unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActorKind {
    Character,
    System,
    Plugin,
    Other(String),
}

impl ActorKind {
    /// Returns the wire string for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            ActorKind::Character => "character",
            ActorKind::System => "system",
            ActorKind::Plugin => "plugin",
            ActorKind::Other(raw) => raw,
        }
    }
}

impl Default for ActorKind {
    fn default() -> Self {
        ActorKind::Other(String::new())
    }
}

impl From<String> for ActorKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "character" => ActorKind::Character,
            "system" => ActorKind::System,
            "plugin" => ActorKind::Plugin,
            _ => ActorKind::Other(raw),
        }
    }
}

impl From<&str> for ActorKind {
    fn from(raw: &str) -> Self {
        ActorKind::from(raw.to_string())
    }
}

impl From<ActorKind> for String {
    fn from(kind: ActorKind) -> Self {
        match kind {
            ActorKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Events
// ============================================================================

/// Something that happened in the world.
///
/// `timestamp` is Unix milliseconds. Ordering of timestamps within a stream is
/// not guaranteed by this layer. Missing fields deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    /// Unique, time-sortable identifier
    pub id: String,
    /// Stream the event originated on (e.g. `location:01J...`)
    pub stream: String,
    /// Event kind (e.g. `say`, `pose`, `arrive`)
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub actor_kind: ActorKind,
    pub actor_id: String,
    /// Serialized JSON payload
    pub payload: String,
}

impl Event {
    /// Creates an event with a fresh identifier and the current timestamp.
    pub fn new(
        stream: impl Into<String>,
        event_type: impl Into<String>,
        actor_kind: ActorKind,
        actor_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: new_event_id(),
            stream: stream.into(),
            event_type: event_type.into(),
            timestamp: current_timestamp_millis(),
            actor_kind,
            actor_id: actor_id.into(),
            payload: payload.into(),
        }
    }

    /// Parses the payload JSON into `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// An event a handler wants published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitEvent {
    /// Fully addressed destination stream
    pub stream: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Serialized JSON payload
    pub payload: String,
}

impl EmitEvent {
    pub fn new(
        stream: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            stream: stream.into(),
            event_type: event_type.into(),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actor_kind_known_values() {
        assert_eq!(ActorKind::from("character"), ActorKind::Character);
        assert_eq!(ActorKind::from("system"), ActorKind::System);
        assert_eq!(ActorKind::from("plugin"), ActorKind::Plugin);
        assert_eq!(ActorKind::Plugin.to_string(), "plugin");
    }

    #[test]
    fn test_actor_kind_unknown_value_passes_through() {
        let kind = ActorKind::from("wizard");
        assert_eq!(kind, ActorKind::Other("wizard".to_string()));
        assert_eq!(String::from(kind), "wizard");
        assert_eq!(ActorKind::default().as_str(), "");
    }

    #[test]
    fn test_event_new_assigns_id_and_timestamp() {
        let event = Event::new("location:lobby", event_types::SAY, ActorKind::Character, "c1", "{}");
        assert!(!event.id.is_empty());
        assert!(event.timestamp > 0);
        assert_eq!(event.stream, "location:lobby");
        assert_eq!(event.event_type, "say");
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event {
            id: "evt-1".to_string(),
            stream: "global".to_string(),
            event_type: "system".to_string(),
            timestamp: 1_700_000_000_000,
            actor_kind: ActorKind::System,
            actor_id: "sys".to_string(),
            payload: r#"{"k":"v"}"#.to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "system");
        assert_eq!(value["actor_kind"], "system");
        assert_eq!(value["timestamp"], json!(1_700_000_000_000i64));
    }

    #[test]
    fn test_decode_payload() {
        #[derive(Deserialize)]
        struct Say {
            message: String,
        }

        let event = Event::new("global", "say", ActorKind::Character, "c1", r#"{"message":"hi"}"#);
        let say: Say = event.decode_payload().unwrap();
        assert_eq!(say.message, "hi");

        let broken = Event::new("global", "say", ActorKind::Character, "c1", "not json");
        assert!(broken.decode_payload::<Say>().is_err());
    }
}
