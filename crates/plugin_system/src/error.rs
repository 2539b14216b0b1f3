//! Error types for the plugin system.

use crate::handshake::HandshakeError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginSystemError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Plugin {plugin} timed out after {timeout:?}")]
    Timeout { plugin: String, timeout: Duration },

    #[error("Plugin not loaded: {0}")]
    NotLoaded(String),

    #[error("Plugin already loaded: {0}")]
    AlreadyLoaded(String),

    #[error("Plugin host is closed")]
    HostClosed,

    /// The plugin ran, but its handler reported a failure.
    #[error("Plugin {0}")]
    Handler(String),
}

impl From<serde_json::Error> for PluginSystemError {
    fn from(e: serde_json::Error) -> Self {
        PluginSystemError::Protocol(format!("malformed message: {e}"))
    }
}
