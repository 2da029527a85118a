// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types for uawalk-config.
//!
//! Settings are named by their dotted key (`walk.max_concurrency`) or, for
//! environment overrides, by the variable name.

use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

/// Origin used for configuration parsed from a string.
pub const INLINE_ORIGIN: &str = "<inline>";

/// Errors locating, reading, parsing or validating a crawler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Config file '{}' does not exist", path.display())]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The configuration file exists but cannot be read.
    #[error("Cannot read config file '{}': {source}", path.display())]
    Unreadable {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension names no supported format.
    #[error("Unknown config format '{extension}' (use .yaml, .yml, .toml or .json)")]
    UnknownFormat {
        /// Offending extension.
        extension: String,
    },

    /// The document is not valid for its format or does not match the schema.
    #[error("Malformed {format} in {origin}: {message}")]
    Malformed {
        /// File path or [`INLINE_ORIGIN`].
        origin: String,
        /// Format name.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// A setting that must be present is empty.
    #[error("'{key}' must be set")]
    Required {
        /// Dotted setting key.
        key: String,
    },

    /// A setting has an unusable value.
    #[error("Invalid value for '{key}': {reason}")]
    Invalid {
        /// Dotted setting key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A numeric setting is outside its allowed range.
    #[error("'{key}' is {value}, allowed range is {min}..={max}")]
    OutOfRange {
        /// Dotted setting key.
        key: String,
        /// Actual value.
        value: String,
        /// Lowest allowed value.
        min: String,
        /// Highest allowed value.
        max: String,
    },

    /// An environment override cannot be parsed.
    #[error("Environment override {variable} rejected: {reason}")]
    BadOverride {
        /// Variable name.
        variable: String,
        /// Parser message.
        reason: String,
    },
}

impl ConfigError {
    /// Creates a not-found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a read error.
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    /// Creates an unknown-format error.
    pub fn unknown_format(extension: impl Into<String>) -> Self {
        Self::UnknownFormat {
            extension: extension.into(),
        }
    }

    /// Creates a malformed-document error.
    pub fn malformed(origin: impl Into<String>, format: &'static str, message: impl Display) -> Self {
        Self::Malformed {
            origin: origin.into(),
            format,
            message: message.to_string(),
        }
    }

    /// Creates a required-setting error.
    pub fn required(key: impl Into<String>) -> Self {
        Self::Required { key: key.into() }
    }

    /// Creates an invalid-setting error.
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range<T: Display>(key: impl Into<String>, value: T, min: T, max: T) -> Self {
        Self::OutOfRange {
            key: key.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Creates a rejected-override error.
    pub fn bad_override(variable: impl Into<String>, reason: impl Display) -> Self {
        Self::BadOverride {
            variable: variable.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns the setting key or variable the error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Required { key } | Self::Invalid { key, .. } | Self::OutOfRange { key, .. } => {
                Some(key)
            }
            Self::BadOverride { variable, .. } => Some(variable),
            _ => None,
        }
    }

    /// Returns `true` if the file itself could not be used.
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Unreadable { .. } | Self::UnknownFormat { .. }
        )
    }

    /// Short kind name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Unreadable { .. } => "unreadable",
            Self::UnknownFormat { .. } => "unknown_format",
            Self::Malformed { .. } => "malformed",
            Self::Required { .. } => "required",
            Self::Invalid { .. } => "invalid",
            Self::OutOfRange { .. } => "out_of_range",
            Self::BadOverride { .. } => "bad_override",
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_the_setting() {
        let error = ConfigError::invalid("output.file_name", "'..' names a directory, not a file");
        assert_eq!(error.key(), Some("output.file_name"));
        assert_eq!(error.kind(), "invalid");
        assert_eq!(
            error.to_string(),
            "Invalid value for 'output.file_name': '..' names a directory, not a file"
        );

        let error = ConfigError::bad_override("UAWALK_MAX_DEPTH", "invalid digit found in string");
        assert_eq!(error.key(), Some("UAWALK_MAX_DEPTH"));

        assert_eq!(ConfigError::not_found("uawalk.yaml").key(), None);
    }

    #[test]
    fn test_file_errors() {
        let error = ConfigError::unreadable(
            "uawalk.yaml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(error.is_file_error());
        assert!(std::error::Error::source(&error).is_some());
        assert!(ConfigError::unknown_format("ini").is_file_error());
        assert!(!ConfigError::required("connection.endpoint").is_file_error());
    }

    #[test]
    fn test_malformed_names_origin_and_format() {
        let error = ConfigError::malformed("/etc/uawalk.toml", "TOML", "expected `=`");
        assert_eq!(error.to_string(), "Malformed TOML in /etc/uawalk.toml: expected `=`");
        assert_eq!(error.kind(), "malformed");
    }

    #[test]
    fn test_out_of_range() {
        let error = ConfigError::out_of_range("connection.retry.jitter", 2.0, 0.0, 1.0);
        assert_eq!(error.to_string(), "'connection.retry.jitter' is 2, allowed range is 0..=1");
        assert_eq!(error.kind(), "out_of_range");
    }
}
