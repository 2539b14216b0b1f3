//! # Handshake
//!
//! Host and plugin agree on a protocol version and a shared secret before any
//! event traffic. The host passes both to the plugin process through its
//! environment:
//!
//! - `WORLDHOST_PLUGIN=worldhost-v1` (the magic cookie)
//! - `PLUGIN_PROTOCOL_VERSIONS=1` (comma-separated versions the host speaks)
//!
//! The plugin validates them, then prints a single line on stdout
//! (`<core>|<app>|stdio`) that the host checks before sending the first
//! frame. Any mismatch on either side is fatal for that plugin.

use const_format::concatcp;
use thiserror::Error;

/// Version of the handshake line format itself.
pub const CORE_PROTOCOL_VERSION: u32 = 1;

/// Version of the request/response contract.
pub const PROTOCOL_VERSION: u32 = 1;

pub const MAGIC_COOKIE_KEY: &str = "WORLDHOST_PLUGIN";
pub const MAGIC_COOKIE_VALUE: &str = concatcp!("worldhost-v", PROTOCOL_VERSION);

/// Environment variable carrying the versions the host accepts.
pub const PROTOCOL_VERSIONS_ENV: &str = "PLUGIN_PROTOCOL_VERSIONS";

/// Only transport currently negotiated.
pub const TRANSPORT_STDIO: &str = "stdio";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("magic cookie {key} is not set; this binary is a plugin and must be launched by the host")]
    MissingCookie { key: String },

    #[error("magic cookie {key} has an unexpected value")]
    CookieMismatch { key: String },

    #[error("host offers protocol versions [{offered}], plugin speaks {supported}")]
    UnsupportedVersion { offered: String, supported: u32 },

    #[error("malformed handshake line: {0:?}")]
    MalformedLine(String),

    #[error("protocol version mismatch: expected {expected}, plugin reported {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),
}

/// The version and secret pair both sides must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub protocol_version: u32,
    pub magic_cookie_key: &'static str,
    pub magic_cookie_value: &'static str,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            magic_cookie_key: MAGIC_COOKIE_KEY,
            magic_cookie_value: MAGIC_COOKIE_VALUE,
        }
    }
}

impl HandshakeConfig {
    /// Environment the host sets on a plugin process.
    pub fn env_pairs(&self) -> [(&'static str, String); 2] {
        [
            (self.magic_cookie_key, self.magic_cookie_value.to_string()),
            (PROTOCOL_VERSIONS_ENV, self.protocol_version.to_string()),
        ]
    }

    /// Plugin side: checks the environment the host launched us with.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Reads one environment variable. Production code passes
    ///   `|k| std::env::var(k).ok()`.
    pub fn validate_environment<F>(&self, lookup: F) -> Result<(), HandshakeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(self.magic_cookie_key) {
            None => {
                return Err(HandshakeError::MissingCookie {
                    key: self.magic_cookie_key.to_string(),
                })
            }
            Some(value) if value != self.magic_cookie_value => {
                return Err(HandshakeError::CookieMismatch {
                    key: self.magic_cookie_key.to_string(),
                })
            }
            Some(_) => {}
        }

        let offered = lookup(PROTOCOL_VERSIONS_ENV).unwrap_or_default();
        let speaks_ours = offered
            .split(',')
            .filter_map(|v| v.trim().parse::<u32>().ok())
            .any(|v| v == self.protocol_version);

        if speaks_ours {
            Ok(())
        } else {
            Err(HandshakeError::UnsupportedVersion {
                offered,
                supported: self.protocol_version,
            })
        }
    }

    /// Plugin side: the line printed to stdout once serving can begin.
    pub fn handshake_line(&self) -> String {
        format!(
            "{}|{}|{}",
            CORE_PROTOCOL_VERSION, self.protocol_version, TRANSPORT_STDIO
        )
    }

    /// Host side: validates the plugin's handshake line.
    pub fn verify_handshake_line(&self, line: &str) -> Result<(), HandshakeError> {
        let line = line.trim();
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() != 3 {
            return Err(HandshakeError::MalformedLine(line.to_string()));
        }

        let core = parts[0]
            .parse::<u32>()
            .map_err(|_| HandshakeError::MalformedLine(line.to_string()))?;
        if core != CORE_PROTOCOL_VERSION {
            return Err(HandshakeError::MalformedLine(line.to_string()));
        }

        let app = parts[1]
            .parse::<u32>()
            .map_err(|_| HandshakeError::MalformedLine(line.to_string()))?;
        if app != self.protocol_version {
            return Err(HandshakeError::VersionMismatch {
                expected: self.protocol_version,
                actual: app,
            });
        }

        if parts[2] != TRANSPORT_STDIO {
            return Err(HandshakeError::UnsupportedTransport(parts[2].to_string()));
        }

        Ok(())
    }
}
