// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the uawalk binary.

use std::fmt;

use thiserror::Error;
use tracing::error;

use uawalk_config::ConfigError;
use uawalk_opcua::OpcUaError;

use crate::sink::SinkError;

/// Result type alias for uawalk-bin operations.
pub type BinResult<T> = Result<T, BinError>;

// =============================================================================
// Stage
// =============================================================================

/// Lifecycle stage in which a fatal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Opening the connection.
    Connecting,
    /// Creating and activating the session.
    Session,
    /// Walking the address space.
    Walking,
    /// Writing the CSV file.
    Writing,
}

impl Stage {
    /// Returns the stage name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Connecting => "connecting",
            Stage::Session => "session",
            Stage::Walking => "walking",
            Stage::Writing => "writing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// BinError
// =============================================================================

/// Errors that end a uawalk run.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration file or override error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A setting that parsed but cannot be used.
    #[error("Invalid setting '{field}': {message}")]
    InvalidSetting {
        /// Setting name.
        field: String,
        /// Error message.
        message: String,
    },

    /// OPC UA failure during a lifecycle stage.
    #[error("Failed while {stage}: {source}")]
    OpcUa {
        /// Stage that failed.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: OpcUaError,
    },

    /// Output file could not be written.
    #[error("Failed while writing: {0}")]
    Sink(#[from] SinkError),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl BinError {
    /// Creates an invalid setting error.
    pub fn invalid_setting(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wraps an OPC UA error with the stage it happened in.
    pub fn opcua(stage: Stage, source: OpcUaError) -> Self {
        Self::OpcUa { stage, source }
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Returns the stage this error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::OpcUa { stage, .. } => Some(*stage),
            Self::Sink(_) => Some(Stage::Writing),
            _ => None,
        }
    }

    /// Returns the exit code for this error.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1 | configuration |
    /// | 2 | connection |
    /// | 3 | session |
    /// | 4 | browse |
    /// | 5 | output I/O |
    /// | 6 | runtime |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidSetting { .. } => 1,
            Self::OpcUa { source, .. } => match source {
                OpcUaError::Connection(_) => 2,
                OpcUaError::Session(_) => 3,
                OpcUaError::Browse(_) => 4,
                OpcUaError::Configuration(_) => 1,
            },
            Self::Sink(_) => 5,
            Self::Runtime(_) => 6,
        }
    }

    /// Emits one log event for this error, naming the stage and cause.
    pub fn log(&self) {
        match self {
            Self::OpcUa { stage, source } => source.log(stage.as_str()),
            Self::Sink(e) => error!(stage = Stage::Writing.as_str(), path = %e.path().display(), "{}", e),
            Self::Config(e) => error!(error_type = e.kind(), "{}", e),
            other => error!("{}", other),
        }
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain on stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if let BinError::OpcUa { source, .. } = error {
        for hint in source.recovery_hints() {
            eprintln!("  Hint: {}", hint);
        }
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uawalk_opcua::{ConnectionError, SessionError};

    #[test]
    fn test_error_display_names_stage() {
        let err = BinError::opcua(
            Stage::Walking,
            OpcUaError::browse_failed("ns=2;s=Line1", "BadNodeIdUnknown"),
        );
        let text = err.to_string();
        assert!(text.starts_with("Failed while walking"));
        assert!(text.contains("ns=2;s=Line1"));
        assert_eq!(err.stage(), Some(Stage::Walking));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::from(ConfigError::required("x")).exit_code(), 1);
        assert_eq!(BinError::invalid_setting("walk.start_node", "bad").exit_code(), 1);
        assert_eq!(
            BinError::opcua(
                Stage::Connecting,
                ConnectionError::refused("opc.tcp://localhost:4840").into()
            )
            .exit_code(),
            2
        );
        assert_eq!(
            BinError::opcua(Stage::Session, SessionError::creation_failed("denied").into())
                .exit_code(),
            3
        );
        assert_eq!(
            BinError::opcua(Stage::Session, OpcUaError::not_connected()).exit_code(),
            3
        );
        assert_eq!(
            BinError::opcua(Stage::Walking, OpcUaError::browse_failed("i=85", "bad"))
                .exit_code(),
            4
        );
        assert_eq!(BinError::runtime("no runtime").exit_code(), 6);
    }

    #[test]
    fn test_sink_error_is_writing_stage() {
        let err = BinError::from(SinkError::missing_directory("/nonexistent"));
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.stage(), Some(Stage::Writing));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Connecting.to_string(), "connecting");
        assert_eq!(Stage::Session.to_string(), "session");
        assert_eq!(Stage::Writing.as_str(), "writing");
    }
}
