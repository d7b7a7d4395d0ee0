//! Command-line interface for flightwatch.
//!
//! This module provides the CLI structure for the `flightwatch` binary and
//! the renderers its commands print with.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{CheckCommand, ConfigCommand, HistoryCommand, StatusCommand};

use crate::logging::Verbosity;

/// flightwatch - Know when your aircraft take off and land
///
/// Polls public ADS-B feeds for a fixed fleet, detects takeoffs and landings,
/// and sends an alert for each one.
#[derive(Debug, Parser)]
#[command(name = "flightwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll on the configured schedule until interrupted
    Run,

    /// Run one reconciliation now and print what was seen
    Check(CheckCommand),

    /// Show the tracked fleet, active aircraft and sources
    Status(StatusCommand),

    /// Show recent takeoffs and landings
    History(HistoryCommand),

    /// Send a test alert through the configured notifier
    NotifyTest,

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "flightwatch");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["flightwatch", "run"]).unwrap();
        assert!(matches!(cli.command, Command::Run));
        assert_eq!(cli.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_parse_check_json() {
        let cli = Cli::try_parse_from(["flightwatch", "check", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Check(CheckCommand { json: true })));
    }

    #[test]
    fn test_parse_history_limit() {
        let cli = Cli::try_parse_from(["flightwatch", "history", "-l", "5"]).unwrap();
        match cli.command {
            Command::History(cmd) => {
                assert_eq!(cmd.limit, 5);
                assert!(!cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_history_default_limit() {
        let cli = Cli::try_parse_from(["flightwatch", "history"]).unwrap();
        assert!(matches!(cli.command, Command::History(HistoryCommand { limit: 20, .. })));
    }

    #[test]
    fn test_parse_notify_test() {
        let cli = Cli::try_parse_from(["flightwatch", "notify-test"]).unwrap();
        assert!(matches!(cli.command, Command::NotifyTest));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["flightwatch", "config", "validate", "-f", "/tmp/fw.toml"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli =
            Cli::try_parse_from(["flightwatch", "status", "-vv", "-c", "/custom/config.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_with_quiet() {
        let cli = Cli::try_parse_from(["flightwatch", "-q", "status"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["flightwatch", "daemon"]).is_err());
    }
}
