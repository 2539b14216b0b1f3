//! Configuration management for the world host.
//!
//! This module handles loading, validation, and conversion of host configuration
//! from TOML files and command-line arguments.

use plugin_system::{HostOptions, PluginSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use world_event_system::{Property, PropertyError, PropertyRegistry, PropertyType};

fn default_event_timeout_ms() -> u64 {
    5_000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_event_queue_capacity() -> usize {
    1024
}

fn default_enabled() -> bool {
    true
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Plugin host settings
    #[serde(default)]
    pub host: HostSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Out-of-process plugins to launch at startup
    #[serde(default)]
    pub plugins: Vec<PluginSettings>,
    /// Property catalog seeded into the registry at startup
    #[serde(default = "default_properties")]
    pub properties: Vec<PropertySettings>,
}

/// Timeouts and queue sizes for the plugin host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Per-event delivery timeout in milliseconds
    #[serde(default = "default_event_timeout_ms")]
    pub event_timeout_ms: u64,
    /// Time a plugin gets to complete its handshake, in milliseconds
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Inbound events buffered before producers wait
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            event_timeout_ms: default_event_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
    /// Optional log file path; logs go to stdout when unset
    pub file_path: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_path: None,
        }
    }
}

/// One out-of-process plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Name the plugin is registered under
    pub name: String,
    /// Path to the plugin executable
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSettings>,
}

/// A stream the plugin listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    pub stream: String,
    /// Event types to receive; empty means every type
    #[serde(default)]
    pub event_types: Vec<String>,
}

/// A property seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySettings {
    pub name: String,
    /// One of `string`, `text`, `number`, `bool`
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default)]
    pub capability: String,
    #[serde(default)]
    pub applies_to: Vec<String>,
}

impl PropertySettings {
    /// Validates the seed and builds the property.
    pub fn to_property(&self) -> Result<Property, PropertyError> {
        let property_type: PropertyType = self.property_type.parse()?;
        Property::new(
            self.name.clone(),
            property_type,
            self.capability.clone(),
            self.applies_to.iter().cloned(),
        )
    }
}

fn default_properties() -> Vec<PropertySettings> {
    vec![
        PropertySettings {
            name: "description".to_string(),
            property_type: "text".to_string(),
            capability: "property.set.description".to_string(),
            applies_to: vec![
                "location".to_string(),
                "object".to_string(),
                "character".to_string(),
                "exit".to_string(),
            ],
        },
        PropertySettings {
            name: "name".to_string(),
            property_type: "string".to_string(),
            capability: "property.set.name".to_string(),
            applies_to: vec![
                "location".to_string(),
                "object".to_string(),
                "exit".to_string(),
            ],
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: HostSettings::default(),
            logging: LoggingSettings::default(),
            plugins: Vec::new(),
            properties: default_properties(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation failed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Timeouts for the plugin host.
    pub fn host_options(&self) -> HostOptions {
        HostOptions {
            event_timeout: Duration::from_millis(self.host.event_timeout_ms),
            handshake_timeout: Duration::from_millis(self.host.handshake_timeout_ms),
        }
    }

    /// Launch specs for every enabled plugin.
    pub fn plugin_specs(&self) -> Vec<PluginSpec> {
        self.plugins
            .iter()
            .filter(|p| p.enabled)
            .map(|p| PluginSpec::new(p.name.clone(), p.executable.clone()).with_args(p.args.clone()))
            .collect()
    }

    /// Builds a fresh registry from the configured property seeds.
    pub fn build_property_registry(&self) -> Result<PropertyRegistry, PropertyError> {
        let registry = PropertyRegistry::new();
        for seed in &self.properties {
            registry.register(seed.to_property()?)?;
        }
        Ok(registry)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.event_timeout_ms == 0 {
            return Err("host.event_timeout_ms must be greater than 0".to_string());
        }
        if self.host.handshake_timeout_ms == 0 {
            return Err("host.handshake_timeout_ms must be greater than 0".to_string());
        }
        if self.host.event_queue_capacity == 0 {
            return Err("host.event_queue_capacity must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        let mut plugin_names = HashSet::new();
        for plugin in &self.plugins {
            if plugin.name.trim().is_empty() {
                return Err("Plugin name cannot be empty".to_string());
            }
            if plugin.executable.trim().is_empty() {
                return Err(format!("Plugin {} has no executable", plugin.name));
            }
            if !plugin_names.insert(plugin.name.as_str()) {
                return Err(format!("Duplicate plugin name: {}", plugin.name));
            }
            if plugin.subscriptions.iter().any(|s| s.stream.trim().is_empty()) {
                return Err(format!(
                    "Plugin {} has a subscription with an empty stream",
                    plugin.name
                ));
            }
        }

        let mut property_names = HashSet::new();
        for seed in &self.properties {
            seed.to_property()
                .map_err(|e| format!("Invalid property {:?}: {e}", seed.name))?;
            if !property_names.insert(seed.name.as_str()) {
                return Err(format!("Duplicate property: {}", seed.name));
            }
        }

        Ok(())
    }
}
