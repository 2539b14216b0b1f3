//! Plugin host: loads plugins, delivers events to them and shuts them down.

use crate::client::PluginClient;
use crate::error::PluginSystemError;
use crate::handler::{Handler, LocalPlugin};
use crate::handshake::{HandshakeConfig, HandshakeError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use world_event_system::{EmitEvent, Event};

/// Default per-event delivery timeout.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a plugin process gets to print its handshake line.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeouts applied by a [`PluginHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostOptions {
    pub event_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            event_timeout: DEFAULT_EVENT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// How to launch an out-of-process plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    pub name: String,
    pub executable: PathBuf,
    pub args: Vec<String>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

enum Backend {
    Local(LocalPlugin),
    Process {
        client: PluginClient,
        child: Mutex<Child>,
    },
}

/// Information about a loaded plugin.
struct LoadedPlugin {
    name: String,
    backend: Backend,
}

impl LoadedPlugin {
    async fn deliver(&self, event: Event) -> Result<Vec<EmitEvent>, PluginSystemError> {
        match &self.backend {
            Backend::Local(plugin) => plugin
                .handle_event(event)
                .await
                .map_err(|e| PluginSystemError::Handler(e.to_string())),
            Backend::Process { client, .. } => client.call(event).await,
        }
    }

    async fn shutdown(&self) {
        if let Backend::Process { child, .. } = &self.backend {
            kill_child(&self.name, &mut *child.lock().await).await;
        }
    }
}

async fn kill_child(name: &str, child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Failed to stop plugin process {}: {}", name, e);
    }
}

/// Owns every loaded plugin, in-process or out-of-process, behind a single
/// name-keyed interface.
///
/// Plugin misbehaviour (bad frames, dead processes, slow or failing
/// handlers) always surfaces as a [`PluginSystemError`]; the host itself
/// never panics because of a plugin.
pub struct PluginHost {
    plugins: DashMap<String, Arc<LoadedPlugin>>,
    closed: AtomicBool,
    options: HostOptions,
    handshake: HandshakeConfig,
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new(HostOptions::default())
    }
}

impl PluginHost {
    /// Creates a host with the given timeouts and the default handshake.
    pub fn new(options: HostOptions) -> Self {
        Self {
            plugins: DashMap::new(),
            closed: AtomicBool::new(false),
            options,
            handshake: HandshakeConfig::default(),
        }
    }

    pub fn options(&self) -> HostOptions {
        self.options
    }

    /// Spawns a plugin executable and completes the handshake with it.
    ///
    /// # Arguments
    ///
    /// * `spec` - Name and command line of the plugin
    ///
    /// # Returns
    ///
    /// `Ok(())` once the plugin is ready for events. On any failure the child
    /// process is killed before the error is returned.
    pub async fn load(&self, spec: &PluginSpec) -> Result<(), PluginSystemError> {
        self.ensure_open()?;
        if self.plugins.contains_key(&spec.name) {
            return Err(PluginSystemError::AlreadyLoaded(spec.name.clone()));
        }

        info!("🔄 Loading plugin {} from {}", spec.name, spec.executable.display());

        let mut child = Command::new(&spec.executable)
            .args(&spec.args)
            .envs(self.handshake.env_pairs())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                kill_child(&spec.name, &mut child).await;
                return Err(PluginSystemError::Protocol(format!(
                    "plugin {} has no stdio pipes",
                    spec.name
                )));
            }
        };

        let mut reader = BufReader::new(stdout);
        if let Err(e) = self.read_handshake(&spec.name, &mut reader).await {
            error!("❌ Handshake with plugin {} failed: {}", spec.name, e);
            kill_child(&spec.name, &mut child).await;
            return Err(e);
        }

        let plugin = LoadedPlugin {
            name: spec.name.clone(),
            backend: Backend::Process {
                client: PluginClient::new(spec.name.clone(), reader, stdin),
                child: Mutex::new(child),
            },
        };

        // Another load of the same name may have finished while we were
        // waiting for the handshake.
        let plugin = Arc::new(plugin);
        let inserted = match self.plugins.entry(spec.name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&plugin));
                true
            }
        };

        if !inserted {
            plugin.shutdown().await;
            return Err(PluginSystemError::AlreadyLoaded(spec.name.clone()));
        }
        info!("✅ Plugin loaded: {}", spec.name);
        Ok(())
    }

    async fn read_handshake(
        &self,
        name: &str,
        reader: &mut BufReader<tokio::process::ChildStdout>,
    ) -> Result<(), PluginSystemError> {
        let mut line = String::new();
        let read = tokio::time::timeout(self.options.handshake_timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| PluginSystemError::Timeout {
                plugin: name.to_string(),
                timeout: self.options.handshake_timeout,
            })??;

        if read == 0 {
            return Err(HandshakeError::MalformedLine(String::new()).into());
        }
        self.handshake.verify_handshake_line(&line)?;
        Ok(())
    }

    /// Registers an in-process handler under `name`.
    pub fn register_local(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<(), PluginSystemError> {
        self.ensure_open()?;
        let name = name.into();
        match self.plugins.entry(name.clone()) {
            Entry::Occupied(_) => Err(PluginSystemError::AlreadyLoaded(name)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(LoadedPlugin {
                    name: name.clone(),
                    backend: Backend::Local(LocalPlugin::new(handler)),
                }));
                info!("✅ Local plugin registered: {}", name);
                Ok(())
            }
        }
    }

    /// Delivers one event to a plugin, bounded by the host's event timeout.
    ///
    /// # Returns
    ///
    /// The plugin's emitted events. Errors:
    /// [`PluginSystemError::NotLoaded`], [`PluginSystemError::HostClosed`],
    /// [`PluginSystemError::Timeout`], [`PluginSystemError::Handler`] or a
    /// transport/protocol error.
    pub async fn deliver_event(
        &self,
        name: &str,
        event: Event,
    ) -> Result<Vec<EmitEvent>, PluginSystemError> {
        self.ensure_open()?;
        let plugin = self
            .plugins
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PluginSystemError::NotLoaded(name.to_string()))?;

        let timeout = self.options.event_timeout;
        tokio::time::timeout(timeout, plugin.deliver(event))
            .await
            .map_err(|_| PluginSystemError::Timeout {
                plugin: name.to_string(),
                timeout,
            })?
    }

    /// Removes a plugin and stops its process, if any.
    pub async fn unload(&self, name: &str) -> Result<(), PluginSystemError> {
        self.ensure_open()?;
        let (_, plugin) = self
            .plugins
            .remove(name)
            .ok_or_else(|| PluginSystemError::NotLoaded(name.to_string()))?;
        plugin.shutdown().await;
        info!("🔌 Plugin unloaded: {}", name);
        Ok(())
    }

    /// Names of loaded plugins in sorted order. Empty once closed.
    pub fn plugins(&self) -> Vec<String> {
        if self.is_closed() {
            return Vec::new();
        }
        let mut names: Vec<String> = self.plugins.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        !self.is_closed() && self.plugins.contains_key(name)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops every plugin. Further operations fail with
    /// [`PluginSystemError::HostClosed`]. Closing twice is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let names: Vec<String> = self.plugins.iter().map(|e| e.key().clone()).collect();
        info!("🛑 Shutting down {} plugins", names.len());
        for name in names {
            if let Some((_, plugin)) = self.plugins.remove(&name) {
                plugin.shutdown().await;
            }
        }
        info!("🧹 Plugin cleanup completed");
    }

    fn ensure_open(&self) -> Result<(), PluginSystemError> {
        if self.is_closed() {
            Err(PluginSystemError::HostClosed)
        } else {
            Ok(())
        }
    }
}
