//! Main application logic and lifecycle management.
//!
//! The `Application` loads plugins, wires the subscriber between the event
//! feed and the broadcast sink, and tears everything down on shutdown.

use crate::broadcast::LogBroadcastSink;
use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::feed::feed_events;
use crate::logging::display_banner;
use crate::signals::{setup_signal_handlers, setup_signal_handlers_silent};
use futures::future::join_all;
use plugin_system::{PluginHost, PluginSpec, Subscriber};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use world_event_system::PropertyRegistry;

/// The running world host.
pub struct Application {
    config: AppConfig,
    host: Arc<PluginHost>,
    subscriber: Arc<Subscriber>,
    sink: Arc<LogBroadcastSink>,
    registry: Arc<PropertyRegistry>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Returns
    ///
    /// A configured `Application` with its plugins loaded, or an error if the
    /// configuration is invalid. Individual plugins that fail to load are
    /// logged and skipped.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        apply_overrides(&mut config, &args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();
        Self::from_config(config).await
    }

    /// Builds the application from an already validated configuration.
    pub async fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Arc::new(config.build_property_registry()?);
        info!("🏷️ Property catalog: {}", registry.names().join(", "));

        let host = Arc::new(PluginHost::new(config.host_options()));
        let sink = Arc::new(LogBroadcastSink::new());
        let subscriber = Arc::new(Subscriber::new(Arc::clone(&host), sink.clone()));

        let app = Self {
            config,
            host,
            subscriber,
            sink,
            registry,
        };
        app.load_plugins().await;
        Ok(app)
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    pub fn subscriber(&self) -> &Arc<Subscriber> {
        &self.subscriber
    }

    pub fn registry(&self) -> &Arc<PropertyRegistry> {
        &self.registry
    }

    /// Loads every enabled plugin concurrently and subscribes the ones that
    /// came up.
    async fn load_plugins(&self) {
        let specs: Vec<PluginSpec> = self.config.plugin_specs();
        if specs.is_empty() {
            warn!("⚠️ No plugins configured");
            return;
        }

        let results = join_all(specs.iter().map(|spec| self.host.load(spec))).await;

        for (spec, result) in specs.iter().zip(results) {
            match result {
                Ok(()) => {
                    info!("🔌 Loaded plugin {} ({})", spec.name, spec.executable.display());
                    self.subscribe_plugin(&spec.name);
                }
                Err(e) => error!("❌ Failed to load plugin {}: {}", spec.name, e),
            }
        }
    }

    fn subscribe_plugin(&self, name: &str) {
        let Some(settings) = self.config.plugins.iter().find(|p| p.name == name) else {
            return;
        };
        for subscription in &settings.subscriptions {
            self.subscriber.subscribe(
                name,
                &subscription.stream,
                subscription.event_types.iter().cloned(),
            );
        }
    }

    /// Runs until a shutdown signal arrives.
    ///
    /// Events are read from stdin, one JSON object per line. Shutdown stops
    /// the feed, waits for in-flight deliveries and then closes every plugin.
    /// A second signal during shutdown exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting world host");
        self.log_configuration_summary();

        let (events_tx, events_rx) = mpsc::channel(self.config.host.event_queue_capacity);
        self.subscriber.start(events_rx).await;

        let feed_handle = tokio::spawn(async move {
            match feed_events(BufReader::new(tokio::io::stdin()), events_tx).await {
                Ok(count) => info!("📭 Event feed closed after {} events", count),
                Err(e) => error!("❌ Event feed failed: {}", e),
            }
        });

        info!("✅ World host is now running");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        setup_signal_handlers().await?;

        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        self.shutdown(feed_handle).await;
        Ok(())
    }

    async fn shutdown(self, feed_handle: tokio::task::JoinHandle<()>) {
        info!("📡 Phase 1: Stopping the event feed...");
        // Dropping the feed task drops the last sender, which ends the dispatch loop
        feed_handle.abort();
        if let Err(e) = feed_handle.await {
            if e.is_panic() {
                warn!("⚠️ Event feed task panicked: {}", e);
            }
        }

        info!("⏳ Phase 2: Waiting for in-flight deliveries...");
        self.subscriber.stop().await;

        info!("🔌 Phase 3: Shutting down plugins...");
        self.host.close().await;

        info!("📊 Final Statistics:");
        info!("  - Events broadcast: {}", self.sink.published());
        info!("  - Events rejected: {}", self.sink.rejected());
        info!("✅ World host shutdown complete");
    }

    fn log_configuration_summary(&self) {
        let options = self.config.host_options();
        info!("📋 Configuration Summary:");
        info!("  ⏱️ Event timeout: {:?}", options.event_timeout);
        info!("  🤝 Handshake timeout: {:?}", options.handshake_timeout);
        info!("  📬 Event queue capacity: {}", self.config.host.event_queue_capacity);
        info!("  🔌 Plugins loaded: {:?}", self.host.plugins());
        info!("  📝 Subscriptions: {}", self.subscriber.subscription_count());
    }
}

/// CLI values win over file values.
fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if let Some(timeout) = args.event_timeout_ms {
        config.host.event_timeout_ms = timeout;
    }
}
