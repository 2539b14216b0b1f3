//! Plugin system for running world event handlers out of process.
//!
//! A plugin is any executable that links this crate, implements [`Handler`]
//! and calls [`serve`] from `main`. The host side loads plugins with
//! [`PluginHost`], delivers events through it and feeds it from a
//! [`Subscriber`]:
//!
//! ```text
//! world event ──► Subscriber ──► PluginHost ──► PluginClient ══ stdio ══► serve ──► Handler
//!                     ▲                                                             │
//!                     └──────────────── EventSink ◄──── EmitEvents ◄────────────────┘
//! ```
//!
//! In-process handlers can be registered with the same host and behave
//! exactly like remote ones.

mod client;
mod error;
mod handler;
pub mod handshake;
mod host;
mod server;
mod subscriber;
pub mod wire;

pub use client::PluginClient;
pub use error::PluginSystemError;
pub use handler::{invoke_handler, BoxError, Handler, HandlerError, LocalPlugin};
pub use handshake::{HandshakeConfig, HandshakeError, PROTOCOL_VERSION};
pub use host::{
    HostOptions, PluginHost, PluginSpec, DEFAULT_EVENT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT,
};
pub use server::{serve, serve_connection, PluginServerAdapter, ServeConfig};
pub use subscriber::{EventSink, Subscriber};

/// Re-export of the event model for plugin authors
pub use world_event_system::{EmitEvent, Event};
