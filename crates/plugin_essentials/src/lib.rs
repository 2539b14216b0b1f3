//! Essentials plugin: the reference out-of-process handler.
//!
//! * `say` events from characters are echoed back on the same stream.
//! * The `set` command checks `<entity_type> <property>=<value>` against the
//!   property catalog and tells the actor whether the property would be
//!   accepted.

use async_trait::async_trait;
use plugin_system::{BoxError, Handler};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use world_event_system::{
    event_types, parse_command_payload, ActorKind, EmitEvent, Emitter, Event, PropertyError,
    PropertyRegistry,
};

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SayPayload {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub message: String,
}

// ============================================================================
// Handler
// ============================================================================

/// Handles `say` and `command` events. Everything else is ignored.
#[derive(Debug)]
pub struct EssentialsHandler {
    properties: PropertyRegistry,
}

impl EssentialsHandler {
    pub fn new() -> Self {
        Self::with_registry(PropertyRegistry::default_registry())
    }

    pub fn with_registry(properties: PropertyRegistry) -> Self {
        Self { properties }
    }

    fn echo(&self, event: &Event) -> Result<Vec<EmitEvent>, BoxError> {
        // Never answer plugin output, including our own echoes
        if event.actor_kind == ActorKind::Plugin {
            return Ok(Vec::new());
        }

        let Ok(say) = event.decode_payload::<SayPayload>() else {
            debug!(event_id = %event.id, "ignoring say with unreadable payload");
            return Ok(Vec::new());
        };

        let reply = SayPayload {
            message: format!("Echo: {}", say.message),
        };
        Ok(vec![EmitEvent::new(
            event.stream.clone(),
            event_types::SAY,
            serde_json::to_string(&reply)?,
        )])
    }

    fn command(&self, event: &Event) -> Vec<EmitEvent> {
        let ctx = parse_command_payload(&event.payload);
        if ctx.name != "set" {
            return Vec::new();
        }

        let character_id = if event.actor_id.is_empty() {
            ctx.character_id.as_str()
        } else {
            event.actor_id.as_str()
        };
        if character_id.is_empty() {
            warn!(event_id = %event.id, "set command without an actor, nothing to reply to");
            return Vec::new();
        }

        let message = self.set_property(&ctx.args);
        let mut emitter = Emitter::with_tracing();
        emitter.character(character_id, event_types::SYSTEM, &SystemMessage { message });
        emitter.flush().0
    }

    /// Validates `<entity_type> <property>=<value>` and describes the outcome.
    pub fn set_property(&self, args: &str) -> String {
        let Some((entity_type, assignment)) = args.trim().split_once(char::is_whitespace) else {
            return SET_USAGE.to_string();
        };
        let Some((property, value)) = assignment.trim().split_once('=') else {
            return SET_USAGE.to_string();
        };
        let property = property.trim();
        if property.is_empty() {
            return SET_USAGE.to_string();
        }

        match self.properties.resolve(property) {
            Ok(resolved) if self.properties.valid_for(entity_type, resolved.name()) => {
                format!("Set {} on {} to: {}", resolved.name(), entity_type, value.trim())
            }
            Ok(resolved) => format!(
                "Property '{}' cannot be set on {}.",
                resolved.name(),
                entity_type
            ),
            Err(PropertyError::NotFound(_)) => format!("Unknown property: {property}"),
            Err(e @ PropertyError::Ambiguous { .. }) => {
                let mut message = e.to_string();
                if let Some(first) = message.get(..1) {
                    let upper = first.to_uppercase();
                    message.replace_range(..1, &upper);
                }
                message
            }
            Err(e) => format!("Cannot set {property}: {e}"),
        }
    }
}

const SET_USAGE: &str = "Usage: set <entity_type> <property>=<value>";

impl Default for EssentialsHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for EssentialsHandler {
    async fn handle_event(&self, event: Event) -> Result<Vec<EmitEvent>, BoxError> {
        match event.event_type.as_str() {
            event_types::SAY => self.echo(&event),
            event_types::COMMAND => Ok(self.command(&event)),
            _ => Ok(Vec::new()),
        }
    }
}
