// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use uawalk_config::{LogFormat, LoggingConfig};

use crate::error::{BinError, BinResult};

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the logging subsystem.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Example
///
/// ```ignore
/// use uawalk_bin::logging::init_logging;
/// use uawalk_config::LoggingConfig;
///
/// init_logging(&LoggingConfig::default())?;
/// ```
pub fn init_logging(config: &LoggingConfig) -> BinResult<()> {
    let filter = build_filter(config.level.as_str());

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(config.with_target)
                    .with_thread_ids(config.with_thread_ids)
                    .with_file(config.with_file)
                    .with_line_number(config.with_file)
                    .with_ansi(std::io::stdout().is_terminal()),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(config.with_target)
                    .with_thread_ids(config.with_thread_ids)
                    .with_file(config.with_file)
                    .with_line_number(config.with_file)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(std::io::stdout().is_terminal()),
            )
            .try_init(),
    };

    result.map_err(|e| BinError::runtime(format!("Failed to initialize logging: {}", e)))
}

/// Level used before the configured subscriber exists.
pub const BOOTSTRAP_LEVEL: &str = "warn";

/// Runs `f` with a scoped stderr subscriber.
///
/// Config loading logs before [`init_logging`] can run; this makes those
/// events visible without installing a global subscriber.
pub fn with_bootstrap_logging<T>(f: impl FnOnce() -> T) -> T {
    let subscriber = tracing_subscriber::registry()
        .with(build_filter(BOOTSTRAP_LEVEL))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal()),
        );
    tracing::subscriber::with_default(subscriber, f)
}

/// Builds the filter: `RUST_LOG` if set, else `level` with a quieter `opcua`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Directives used when `RUST_LOG` is not set.
///
/// The `opcua` crate logs every service call at info, so it is capped at warn
/// unless a more verbose level is requested.
pub fn default_directives(level: &str) -> String {
    match level {
        "trace" | "debug" => level.to_string(),
        _ => format!("{},opcua=warn", level),
    }
}

/// Returns a human-readable description of log levels.
pub fn log_level_help() -> &'static str {
    r#"Log levels (from most to least verbose):
  trace  - Every browse request and reference
  debug  - Connect attempts, walk statistics
  info   - Lifecycle milestones (default)
  warn   - Connect retries, skipped subtrees, failed session close
  error  - Fatal errors only"#
}

// =============================================================================
// Tests
// =============================================================================
