// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing.
//!
//! `-h` selects the host, so help is only available as `--help`.
//! Flags override values from the configuration file and `UAWALK_*`
//! environment variables.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use uawalk_config::{
    BrowseErrorPolicy, ConfigLoader, CrawlerConfig, ExitPolicy, LogFormat, LogLevel, SecretValue,
};

use crate::error::BinResult;
use crate::logging::log_level_help;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uawalk - OPC UA address-space inventory crawler
///
/// Connects to an OPC UA server, walks the address space below the Objects
/// folder and writes every discovered variable, method and other leaf
/// reference to a PATH,NAME CSV file.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uawalk",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "OPC UA address-space inventory crawler",
    long_about = None,
    disable_help_flag = true
)]
pub struct Cli {
    /// Username (empty for anonymous)
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,

    /// Password
    #[arg(short = 'p', long = "password")]
    pub password: Option<String>,

    /// Endpoint URL to browse (e.g. opc.tcp://localhost:4840)
    #[arg(short = 'h', long = "host")]
    pub host: Option<String>,

    /// Output file name
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Output directory
    #[arg(short = 'l', long = "path")]
    pub path: Option<PathBuf>,

    /// Configuration file path (YAML, TOML or JSON; optional)
    #[arg(short, long, default_value = "uawalk.yaml", env = "UAWALK_CONFIG")]
    pub config: PathBuf,

    /// Node to start from (ObjectsFolder or ns=<n>;i=<v> / s= / g= / b=)
    #[arg(long)]
    pub start_node: Option<String>,

    /// Maximum browse requests in flight (0 removes the limit)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Maximum depth of Object expansion
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Skip subtrees whose browse fails and write the remaining rows
    #[arg(long)]
    pub partial_results: bool,

    /// Teardown behavior after a fatal error
    #[arg(long, value_enum)]
    pub exit_policy: Option<ExitPolicyArg>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, long_help = log_level_help(), value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,

    /// Log format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

/// Teardown behavior after a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExitPolicyArg {
    /// Exit without closing the session
    FailFast,
    /// Close the session and disconnect before exiting
    BestEffort,
}

impl From<ExitPolicyArg> for ExitPolicy {
    fn from(arg: ExitPolicyArg) -> Self {
        match arg {
            ExitPolicyArg::FailFast => ExitPolicy::FailFast,
            ExitPolicyArg::BestEffort => ExitPolicy::BestEffort,
        }
    }
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Loads the configuration file (if present), then applies the flags.
    pub fn load_config(&self) -> BinResult<CrawlerConfig> {
        let mut config = ConfigLoader::new().load_optional(&self.config)?;
        self.apply_overrides(&mut config)?;
        Ok(config)
    }

    /// Applies the flags given on the command line and re-validates.
    pub fn apply_overrides(&self, config: &mut CrawlerConfig) -> BinResult<()> {
        if let Some(user) = &self.user {
            config.connection.username = Some(user.clone());
        }
        if let Some(password) = &self.password {
            config.connection.password = Some(SecretValue::new(password.clone()));
        }
        if let Some(host) = &self.host {
            config.connection.endpoint = host.clone();
        }
        if let Some(file) = &self.file {
            config.output.file_name = file.clone();
        }
        if let Some(path) = &self.path {
            config.output.directory = path.clone();
        }
        if let Some(start_node) = &self.start_node {
            config.walk.start_node = start_node.clone();
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.walk.max_concurrency = max_concurrency;
        }
        if self.max_depth.is_some() {
            config.walk.max_depth = self.max_depth;
        }
        if self.partial_results {
            config.walk.on_browse_error = BrowseErrorPolicy::Partial;
        }
        if let Some(policy) = self.exit_policy {
            config.runtime.exit_policy = policy.into();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format.into();
        }
        if let Some(level) = self.effective_log_level() {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(())
    }

    /// Returns the log level selected by flags, if any.
    ///
    /// `--quiet` wins over `--verbose`, which wins over `--log-level`.
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.quiet {
            Some(LogLevel::Warn)
        } else if self.verbose {
            Some(LogLevel::Debug)
        } else {
            self.log_level
        }
    }
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    value.parse()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["uawalk"]);
        assert_eq!(cli.config, PathBuf::from("uawalk.yaml"));
        assert!(cli.host.is_none());
        assert!(!cli.partial_results);
        assert_eq!(cli.effective_log_level(), None);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "uawalk",
            "-u",
            "operator",
            "-p",
            "secret",
            "-h",
            "opc.tcp://plc:4840",
            "-f",
            "plant.csv",
            "-l",
            "/tmp",
        ]);
        assert_eq!(cli.user.as_deref(), Some("operator"));
        assert_eq!(cli.password.as_deref(), Some("secret"));
        assert_eq!(cli.host.as_deref(), Some("opc.tcp://plc:4840"));
        assert_eq!(cli.file.as_deref(), Some("plant.csv"));
        assert_eq!(cli.path, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_long_help_only() {
        let err = Cli::try_parse_from(["uawalk", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);

        // -h expects a host value, not help
        let err = Cli::try_parse_from(["uawalk", "-h"]).unwrap_err();
        assert_ne!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_overrides_win_over_config() {
        let cli = Cli::parse_from([
            "uawalk",
            "-h",
            "opc.tcp://plc:4840",
            "-f",
            "plant.csv",
            "--max-concurrency",
            "4",
            "--max-depth",
            "6",
            "--partial-results",
            "--exit-policy",
            "best-effort",
            "--log-format",
            "json",
        ]);
        let mut config = CrawlerConfig::default();
        cli.apply_overrides(&mut config).unwrap();

        assert_eq!(config.connection.endpoint, "opc.tcp://plc:4840");
        assert_eq!(config.output.file_name, "plant.csv");
        assert_eq!(config.walk.max_concurrency, 4);
        assert_eq!(config.walk.max_depth, Some(6));
        assert_eq!(config.walk.on_browse_error, BrowseErrorPolicy::Partial);
        assert_eq!(config.runtime.exit_policy, ExitPolicy::BestEffort);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let cli = Cli::parse_from(["uawalk", "-h", "localhost:4840"]);
        let mut config = CrawlerConfig::default();
        let err = cli.apply_overrides(&mut config).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_quiet_and_verbose() {
        let cli = Cli::parse_from(["uawalk", "-q", "-v"]);
        assert_eq!(cli.effective_log_level(), Some(LogLevel::Warn));

        let cli = Cli::parse_from(["uawalk", "-v", "--log-level", "error"]);
        assert_eq!(cli.effective_log_level(), Some(LogLevel::Debug));

        let cli = Cli::parse_from(["uawalk", "--log-level", "trace"]);
        assert_eq!(cli.effective_log_level(), Some(LogLevel::Trace));

        assert!(Cli::try_parse_from(["uawalk", "--log-level", "loud"]).is_err());
    }
}
