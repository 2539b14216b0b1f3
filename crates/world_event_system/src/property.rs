//! # Property Registry
//!
//! Catalog of settable entity properties with abbreviation-friendly lookup.
//!
//! [`PropertyRegistry::resolve`] behaves like a command-abbreviation resolver:
//! an exact name always wins, otherwise any unambiguous prefix of a registered
//! name selects it. Ambiguous prefixes fail with the full sorted candidate
//! list so callers can prompt for disambiguation.
//!
//! The registry is an ordinary owned value. Construct one with
//! [`PropertyRegistry::new`] or [`PropertyRegistry::default_registry`] and
//! share it (usually behind an `Arc`) with whatever needs property
//! validation. Properties are never removed once registered.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[cfg(test)]
mod tests;

/// Errors produced while building, registering or resolving properties.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("property name cannot be empty")]
    InvalidName,
    #[error("invalid property type: {0}")]
    InvalidType(String),
    #[error("property already registered: {0}")]
    Duplicate(String),
    #[error("property not found: {0}")]
    NotFound(String),
    #[error("ambiguous property '{prefix}': {}", .matches.join(", "))]
    Ambiguous {
        prefix: String,
        /// Candidate names in lexicographic order
        matches: Vec<String>,
    },
}

/// Value type a property accepts. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// Short single-line text
    String,
    /// Multi-line text
    Text,
    Number,
    Bool,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Text => "text",
            PropertyType::Number => "number",
            PropertyType::Bool => "bool",
        }
    }
}

impl FromStr for PropertyType {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(PropertyType::String),
            "text" => Ok(PropertyType::Text),
            "number" => Ok(PropertyType::Number),
            "bool" => Ok(PropertyType::Bool),
            other => Err(PropertyError::InvalidType(other.to_string())),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed attribute that entities may carry.
///
/// Fields are private so a `Property` can only exist in a validated state and
/// cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name: String,
    property_type: PropertyType,
    capability: String,
    applies_to: BTreeSet<String>,
}

impl Property {
    /// Builds a validated property.
    ///
    /// # Arguments
    ///
    /// * `name` - Full property name. Must not be empty or whitespace only.
    /// * `property_type` - Accepted value type
    /// * `capability` - Capability required to set the property; may be empty
    /// * `applies_to` - Entity types that carry this property; may be empty
    ///
    /// # Returns
    ///
    /// The property, or [`PropertyError::InvalidName`].
    pub fn new<I, S>(
        name: impl Into<String>,
        property_type: PropertyType,
        capability: impl Into<String>,
        applies_to: I,
    ) -> Result<Self, PropertyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PropertyError::InvalidName);
        }

        Ok(Self {
            name,
            property_type,
            capability: capability.into(),
            applies_to: applies_to.into_iter().map(Into::into).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Entity types this property applies to, in sorted order.
    pub fn applies_to(&self) -> impl Iterator<Item = &str> {
        self.applies_to.iter().map(String::as_str)
    }

    /// True if `entity_type` carries this property.
    pub fn applies_to_entity(&self, entity_type: &str) -> bool {
        self.applies_to.contains(entity_type)
    }
}

/// Concurrency-safe map from property name to [`Property`].
///
/// Writers are serialized against each other and against readers. Prefix
/// scans run under the read lock so they always see a complete snapshot.
#[derive(Debug, Default)]
pub struct PropertyRegistry {
    properties: RwLock<BTreeMap<String, Property>>,
}

impl PropertyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with the baseline catalog:
    ///
    /// | name          | type   | applies to                           |
    /// |---------------|--------|--------------------------------------|
    /// | `description` | text   | location, object, character, exit    |
    /// | `name`        | string | location, object, exit               |
    ///
    /// Characters have no `name` property since their names are managed by
    /// the identity layer.
    pub fn default_registry() -> Self {
        Self::from_seeds(DEFAULT_CATALOG)
    }

    /// Builds a registry from static seeds. Panics on the first seed that
    /// fails construction or registration.
    fn from_seeds(seeds: &[PropertySeed]) -> Self {
        let registry = Self::new();
        for &(name, property_type, capability, applies_to) in seeds {
            match Property::new(name, property_type, capability, applies_to.iter().copied()) {
                Ok(property) => registry.must_register(property),
                Err(e) => panic!("invalid built-in property {name:?}: {e}"),
            }
        }
        registry
    }

    /// Adds a property.
    ///
    /// Fails with [`PropertyError::Duplicate`] if the name is taken, leaving
    /// the existing entry untouched.
    pub fn register(&self, property: Property) -> Result<(), PropertyError> {
        if property.name.trim().is_empty() {
            return Err(PropertyError::InvalidName);
        }

        let mut properties = self.write();
        if properties.contains_key(&property.name) {
            return Err(PropertyError::Duplicate(property.name));
        }
        properties.insert(property.name.clone(), property);
        Ok(())
    }

    /// Same as [`register`](Self::register) but panics on failure.
    ///
    /// Only for static registrations known to be valid when the program is
    /// written. Never call this with user-provided data.
    pub fn must_register(&self, property: Property) {
        if let Err(e) = self.register(property) {
            panic!("failed to register property: {e}");
        }
    }

    /// Resolves an exact name or an unambiguous prefix to a property.
    ///
    /// # Arguments
    ///
    /// * `input` - Full or abbreviated property name
    ///
    /// # Returns
    ///
    /// The exact match if one exists, otherwise the single property whose
    /// name starts with `input`. Fails with [`PropertyError::NotFound`] when
    /// nothing matches (including empty input) and with
    /// [`PropertyError::Ambiguous`] when several names do.
    pub fn resolve(&self, input: &str) -> Result<Property, PropertyError> {
        let properties = self.read();

        if let Some(property) = properties.get(input) {
            return Ok(property.clone());
        }
        if input.is_empty() {
            return Err(PropertyError::NotFound(String::new()));
        }

        // BTreeMap keys are ordered, so every name with this prefix is
        // contiguous from `input` onwards and already sorted.
        let mut candidates = properties
            .range::<str, _>((Bound::Included(input), Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(input));

        match (candidates.next(), candidates.next()) {
            (None, _) => Err(PropertyError::NotFound(input.to_string())),
            (Some((_, property)), None) => Ok(property.clone()),
            (Some((first, _)), Some((second, _))) => {
                let mut matches = vec![first.clone(), second.clone()];
                matches.extend(candidates.map(|(name, _)| name.clone()));
                Err(PropertyError::Ambiguous {
                    prefix: input.to_string(),
                    matches,
                })
            }
        }
    }

    /// True if the property named exactly `property_name` applies to
    /// `entity_type`. Prefixes are not resolved here.
    pub fn valid_for(&self, entity_type: &str, property_name: &str) -> bool {
        if entity_type.is_empty() || property_name.is_empty() {
            return false;
        }
        self.read()
            .get(property_name)
            .is_some_and(|property| property.applies_to_entity(entity_type))
    }

    /// Number of registered properties.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    // A writer only panics before mutating the map, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Property>> {
        self.properties.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Property>> {
        self.properties.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Name, type, capability and entity types of a built-in property.
type PropertySeed = (&'static str, PropertyType, &'static str, &'static [&'static str]);

const DEFAULT_CATALOG: &[PropertySeed] = &[
    (
        "description",
        PropertyType::Text,
        "property.set.description",
        &["location", "object", "character", "exit"],
    ),
    (
        "name",
        PropertyType::String,
        "property.set.name",
        &["location", "object", "exit"],
    ),
];
