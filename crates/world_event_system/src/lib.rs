//! # World Event System
//!
//! Shared building blocks for the world host and the plugins it drives:
//!
//! - **Event Model** ([`Event`], [`EmitEvent`]): immutable records for what
//!   happened in the world and what a handler wants published in response.
//! - **Stream Addressing** ([`StreamAddress`]): the `location:<id>`,
//!   `character:<id>` and `global` destinations events are routed to.
//! - **Emitter** ([`Emitter`]): a per-call buffer that addresses outbound
//!   events and keeps payload encoding failures as diagnostics instead of
//!   failing the caller.
//! - **Property Registry** ([`PropertyRegistry`]): a concurrency-safe
//!   catalog of settable entity properties with exact-then-prefix name
//!   resolution and ambiguity reporting.
//! - **Command Context** ([`CommandContext`]): pre-parsed command payloads.
//!
//! ## Quick Start
//!
//! ```rust
//! use world_event_system::{event_types, Emitter, PropertyRegistry};
//! use serde_json::json;
//!
//! let registry = PropertyRegistry::default_registry();
//! let property = registry.resolve("desc").unwrap();
//! assert_eq!(property.name(), "description");
//!
//! let mut emitter = Emitter::new();
//! emitter.location("lobby", event_types::SAY, &json!({"message": "hello"}));
//! let (events, errors) = emitter.flush();
//! assert_eq!(events[0].stream, "location:lobby");
//! assert!(errors.is_empty());
//! ```

pub mod command;
pub mod emitter;
pub mod events;
pub mod property;
pub mod streams;
pub mod utils;

pub use command::{parse_command_payload, CommandContext};
pub use emitter::{DiagnosticSink, EmitError, Emitter, Payload, TracingSink};
pub use events::{event_types, ActorKind, EmitEvent, Event};
pub use property::{Property, PropertyError, PropertyRegistry, PropertyType};
pub use streams::{
    migrate_legacy_stream, StreamAddress, CHARACTER_PREFIX, GLOBAL_STREAM,
    LEGACY_CHARACTER_PREFIX, LOCATION_PREFIX, STREAM_SCHEMA_VERSION,
};
pub use utils::{current_timestamp_millis, new_event_id};
