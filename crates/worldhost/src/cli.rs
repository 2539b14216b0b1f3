//! Command-line interface handling for the world host.
//!
//! This module provides command-line argument parsing using the `clap` crate.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// These override settings from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the per-event plugin timeout
    pub event_timeout_ms: Option<u64>,
}

impl CliArgs {
    /// Parses the process arguments.
    ///
    /// Invalid arguments print usage and exit, as clap does.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list. The first item is the binary name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            event_timeout_ms: matches.get_one::<u64>("event-timeout-ms").copied(),
        }
    }
}

const DEFAULT_CONFIG_PATH: &str = "worldhost.toml";

fn command() -> Command {
    Command::new("worldhost")
        .version(env!("CARGO_PKG_VERSION"))
        .about("World event host that routes events through out-of-process plugins")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("event-timeout-ms")
                .long("event-timeout-ms")
                .value_name("MILLIS")
                .help("Per-event plugin delivery timeout in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["worldhost"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("worldhost.toml"));
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert_eq!(args.event_timeout_ms, None);
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::try_parse_from([
            "worldhost",
            "-c",
            "prod.toml",
            "--log-level",
            "debug",
            "--json-logs",
            "--event-timeout-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.event_timeout_ms, Some(250));
    }

    #[test]
    fn test_rejects_non_numeric_timeout() {
        assert!(CliArgs::try_parse_from(["worldhost", "--event-timeout-ms", "soon"]).is_err());
    }

    #[test]
    fn test_command_is_well_formed() {
        command().debug_assert();
    }
}
