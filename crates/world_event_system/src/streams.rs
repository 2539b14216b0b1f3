//! # Stream Addressing
//!
//! Events are routed to logical streams named with fixed prefixes:
//!
//! - `location:<locationID>`
//! - `character:<characterID>`
//! - `global`
//!
//! The character prefix replaced an earlier `char:` prefix. No stored events
//! use the old form yet, but streams coming from older producers can be
//! normalised with [`migrate_legacy_stream`]. [`STREAM_SCHEMA_VERSION`] must be
//! bumped whenever a prefix changes again.

use std::borrow::Cow;
use std::fmt;

/// Version of the stream naming scheme. Version 1 used `char:`.
pub const STREAM_SCHEMA_VERSION: u32 = 2;

pub const LOCATION_PREFIX: &str = "location:";
pub const CHARACTER_PREFIX: &str = "character:";
pub const GLOBAL_STREAM: &str = "global";

/// Character prefix used by stream schema version 1.
pub const LEGACY_CHARACTER_PREFIX: &str = "char:";

/// A parsed stream name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamAddress {
    Location(String),
    Character(String),
    Global,
    /// Any stream outside the fixed prefixes, kept verbatim
    Other(String),
}

impl StreamAddress {
    /// Parses a stream name. Legacy `char:` names parse as characters.
    pub fn parse(stream: &str) -> Self {
        if stream == GLOBAL_STREAM {
            StreamAddress::Global
        } else if let Some(id) = stream.strip_prefix(LOCATION_PREFIX) {
            StreamAddress::Location(id.to_string())
        } else if let Some(id) = stream.strip_prefix(CHARACTER_PREFIX) {
            StreamAddress::Character(id.to_string())
        } else if let Some(id) = stream.strip_prefix(LEGACY_CHARACTER_PREFIX) {
            StreamAddress::Character(id.to_string())
        } else {
            StreamAddress::Other(stream.to_string())
        }
    }
}

impl fmt::Display for StreamAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamAddress::Location(id) => write!(f, "{LOCATION_PREFIX}{id}"),
            StreamAddress::Character(id) => write!(f, "{CHARACTER_PREFIX}{id}"),
            StreamAddress::Global => f.write_str(GLOBAL_STREAM),
            StreamAddress::Other(raw) => f.write_str(raw),
        }
    }
}

/// Rewrites schema-1 stream names to the current scheme.
///
/// Only `char:<id>` changes; everything else is returned borrowed.
pub fn migrate_legacy_stream(stream: &str) -> Cow<'_, str> {
    match stream.strip_prefix(LEGACY_CHARACTER_PREFIX) {
        Some(id) => Cow::Owned(format!("{CHARACTER_PREFIX}{id}")),
        None => Cow::Borrowed(stream),
    }
}
