//! # World Host
//!
//! Host process for the world event core. It loads out-of-process plugins,
//! feeds them world events and forwards what they emit to the broadcast
//! layer.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (creates worldhost.toml if missing)
//! worldhost
//!
//! # Specify custom configuration and tighter plugin deadlines
//! worldhost --config production.toml --event-timeout-ms 2000
//!
//! # JSON logging for production
//! worldhost --json-logs
//! ```
//!
//! Events arrive on stdin as one JSON object per line:
//!
//! ```text
//! {"stream":"location:lobby","type":"say","actor_kind":"character","actor_id":"c1","payload":"{\"message\":\"hi\"}"}
//! ```
//!
//! ## Signal Handling
//!
//! SIGINT and SIGTERM trigger a graceful shutdown; a second signal exits
//! immediately.

use tracing::error;

mod app;
mod broadcast;
mod cli;
mod config;
mod feed;
mod logging;
mod signals;

pub use app::Application;
pub use broadcast::{BroadcastError, LogBroadcastSink};
pub use cli::CliArgs;
pub use config::{
    AppConfig, HostSettings, LoggingSettings, PluginSettings, PropertySettings,
    SubscriptionSettings,
};
pub use feed::{feed_events, parse_event_line};

/// Main entry point for the world host.
///
/// Handles the complete application lifecycle:
/// 1. Command-line argument parsing
/// 2. Configuration loading and validation
/// 3. Logging system initialization
/// 4. Application creation and execution
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging comes up before the application so that config errors are visible
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}
