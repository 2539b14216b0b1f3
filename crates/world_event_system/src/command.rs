//! Structured access to `command` event payloads.

use serde::{Deserialize, Serialize};

/// A player command as delivered to handlers in a `command` event payload.
///
/// ```json
/// {
///   "name": "say",
///   "args": "Hello everyone!",
///   "invoked_as": ";",
///   "character_name": "Alice",
///   "character_id": "01ABC...",
///   "location_id": "01DEF...",
///   "player_id": "01GHI..."
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandContext {
    /// Canonical command name
    pub name: String,
    /// Everything after the command name; may be empty
    pub args: String,
    /// Command text before alias resolution (e.g. `;` for a pose alias)
    pub invoked_as: String,
    pub character_name: String,
    pub character_id: String,
    pub location_id: String,
    pub player_id: String,
}

/// Parses a command payload. Empty or malformed payloads yield an empty
/// context instead of an error.
pub fn parse_command_payload(payload: &str) -> CommandContext {
    if payload.is_empty() {
        return CommandContext::default();
    }
    serde_json::from_str(payload).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let ctx = parse_command_payload(
            r#"{"name":"pose","args":"waves","invoked_as":":","character_name":"Alice","character_id":"c1","location_id":"l1","player_id":"p1"}"#,
        );
        assert_eq!(ctx.name, "pose");
        assert_eq!(ctx.args, "waves");
        assert_eq!(ctx.invoked_as, ":");
        assert_eq!(ctx.character_name, "Alice");
        assert_eq!(ctx.character_id, "c1");
        assert_eq!(ctx.location_id, "l1");
        assert_eq!(ctx.player_id, "p1");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let ctx = parse_command_payload(r#"{"name":"look"}"#);
        assert_eq!(ctx.name, "look");
        assert!(ctx.args.is_empty());
        assert!(ctx.player_id.is_empty());
    }

    #[test]
    fn test_empty_or_invalid_payload() {
        assert_eq!(parse_command_payload(""), CommandContext::default());
        assert_eq!(parse_command_payload("{not json"), CommandContext::default());
        assert_eq!(parse_command_payload("[1,2]"), CommandContext::default());
    }
}
