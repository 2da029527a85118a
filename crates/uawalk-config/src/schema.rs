// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for uawalk.
//!
//! # Schema Structure
//!
//! ```text
//! CrawlerConfig
//! ├── connection: ConnectionConfig
//! │   └── retry: RetrySettings
//! ├── output: OutputConfig
//! ├── walk: WalkConfig
//! ├── runtime: RuntimeConfig
//! └── logging: LoggingConfig
//! ```
//!
//! Every section is optional; a missing section takes its defaults.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Default server endpoint.
pub const DEFAULT_ENDPOINT: &str = "opc.tcp://localhost:4840";

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = ".";

/// Default output file name.
pub const DEFAULT_OUTPUT_FILE: &str = "nodes.csv";

/// Default start node of the walk.
pub const DEFAULT_START_NODE: &str = "ObjectsFolder";

/// Default application name announced to the server.
pub const DEFAULT_APPLICATION_NAME: &str = "uawalk";

/// Default number of concurrent browse requests.
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Upper bound for `walk.max_concurrency`.
pub const MAX_CONCURRENCY_LIMIT: usize = 1024;

/// Default session timeout.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of connect retries.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for uawalk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Server connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Output file settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Walk settings.
    #[serde(default)]
    pub walk: WalkConfig,

    /// Process-level behavior.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CrawlerConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.connection.validate()?;
        self.output.validate()?;
        self.walk.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// =============================================================================
// Connection Configuration
// =============================================================================

/// Server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// OPC UA endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Username. Empty or absent selects anonymous identity.
    #[serde(default)]
    pub username: Option<String>,

    /// Password, only used together with a username.
    #[serde(default)]
    pub password: Option<SecretValue>,

    /// Security mode (None, Sign, SignAndEncrypt).
    #[serde(default)]
    pub security_mode: SecurityMode,

    /// Security policy.
    #[serde(default)]
    pub security_policy: SecurityPolicy,

    /// Application name announced to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Requested session timeout.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Trust server certificates without a PKI check.
    #[serde(default = "default_true")]
    pub trust_server_certs: bool,

    /// Directory holding the client PKI material.
    #[serde(default)]
    pub pki_dir: Option<PathBuf>,

    /// Connect retry settings.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl ConnectionConfig {
    /// Validates the connection settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::required("connection.endpoint"));
        }
        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(ConfigError::invalid(
                "connection.endpoint",
                "endpoint must start with 'opc.tcp://'",
            ));
        }
        if (self.security_mode == SecurityMode::None) != (self.security_policy == SecurityPolicy::None)
        {
            return Err(ConfigError::invalid(
                "connection.security_mode",
                format!(
                    "security mode {} cannot be combined with policy {}",
                    self.security_mode, self.security_policy
                ),
            ));
        }
        if self.application_name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "connection.application_name",
                "application name cannot be empty",
            ));
        }
        if self.session_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "connection.session_timeout",
                "session timeout must be greater than zero",
            ));
        }
        self.retry.validate()
    }

    /// Returns the username when it selects username/password identity.
    pub fn effective_username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }

    /// Returns `true` if the session authenticates anonymously.
    pub fn is_anonymous(&self) -> bool {
        self.effective_username().is_none()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            username: None,
            password: None,
            security_mode: SecurityMode::default(),
            security_policy: SecurityPolicy::default(),
            application_name: default_application_name(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            trust_server_certs: true,
            pki_dir: None,
            retry: RetrySettings::default(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_application_name() -> String {
    DEFAULT_APPLICATION_NAME.to_string()
}

fn default_session_timeout() -> Duration {
    DEFAULT_SESSION_TIMEOUT
}

fn default_true() -> bool {
    true
}

/// Connect retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for a single delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor between delays.
    pub multiplier: f64,

    /// Random jitter as a fraction of the delay.
    pub jitter: f64,
}

impl RetrySettings {
    /// Validates the retry settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::invalid(
                "connection.retry.initial_delay",
                "initial delay cannot exceed max delay",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "connection.retry.multiplier",
                "multiplier must be at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::out_of_range(
                "connection.retry.jitter",
                self.jitter,
                0.0,
                1.0,
            ));
        }
        Ok(())
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// OPC UA security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityMode {
    /// No security.
    #[default]
    None,
    /// Sign messages.
    Sign,
    /// Sign and encrypt messages.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::None => "None",
            SecurityMode::Sign => "Sign",
            SecurityMode::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(SecurityMode::None),
            "sign" => Ok(SecurityMode::Sign),
            "signandencrypt" | "sign_and_encrypt" | "sign-and-encrypt" => {
                Ok(SecurityMode::SignAndEncrypt)
            }
            _ => Err(format!(
                "unknown security mode '{}', expected None, Sign or SignAndEncrypt",
                s
            )),
        }
    }
}

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityPolicy {
    /// No security.
    #[default]
    None,
    /// Basic256Sha256 policy.
    Basic256Sha256,
    /// Aes128_Sha256_RsaOaep policy.
    #[serde(rename = "Aes128_Sha256_RsaOaep")]
    Aes128Sha256RsaOaep,
    /// Aes256_Sha256_RsaPss policy.
    #[serde(rename = "Aes256_Sha256_RsaPss")]
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the policy name as used in the policy URI.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityPolicy::None => "None",
            SecurityPolicy::Basic256Sha256 => "Basic256Sha256",
            SecurityPolicy::Aes128Sha256RsaOaep => "Aes128_Sha256_RsaOaep",
            SecurityPolicy::Aes256Sha256RsaPss => "Aes256_Sha256_RsaPss",
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "none" => Ok(SecurityPolicy::None),
            "basic256sha256" => Ok(SecurityPolicy::Basic256Sha256),
            "aes128sha256rsaoaep" => Ok(SecurityPolicy::Aes128Sha256RsaOaep),
            "aes256sha256rsapss" => Ok(SecurityPolicy::Aes256Sha256RsaPss),
            _ => Err(format!("unknown security policy '{}'", s)),
        }
    }
}

// =============================================================================
// Output Configuration
// =============================================================================

/// Output file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory the CSV file is written into. Must already exist.
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    /// CSV file name, relative to `directory`. May name a subdirectory,
    /// which must already exist.
    #[serde(default = "default_output_file")]
    pub file_name: String,
}

impl OutputConfig {
    /// Validates the output settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::required("output.directory"));
        }
        if self.file_name.is_empty() {
            return Err(ConfigError::required("output.file_name"));
        }
        if matches!(self.file_name.as_str(), "." | "..") {
            return Err(ConfigError::invalid(
                "output.file_name",
                format!("'{}' names a directory, not a file", self.file_name),
            ));
        }
        Ok(())
    }

    /// Returns the full path of the output file.
    pub fn target_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            file_name: default_output_file(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_output_file() -> String {
    DEFAULT_OUTPUT_FILE.to_string()
}

// =============================================================================
// Walk Configuration
// =============================================================================

/// Address-space walk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalkConfig {
    /// Node the walk starts from (`ObjectsFolder` or `ns=..;i=..` form).
    #[serde(default = "default_start_node")]
    pub start_node: String,

    /// Maximum number of browse requests in flight. `0` removes the limit.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Maximum depth of Object expansion. Unlimited when absent.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// What to do when a browse request fails.
    #[serde(default)]
    pub on_browse_error: BrowseErrorPolicy,
}

impl WalkConfig {
    /// Validates the walk settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.start_node.trim().is_empty() {
            return Err(ConfigError::required("walk.start_node"));
        }
        if self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(ConfigError::out_of_range(
                "walk.max_concurrency",
                self.max_concurrency,
                0,
                MAX_CONCURRENCY_LIMIT,
            ));
        }
        if self.max_depth == Some(0) {
            return Err(ConfigError::invalid(
                "walk.max_depth",
                "max depth must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            start_node: default_start_node(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_depth: None,
            on_browse_error: BrowseErrorPolicy::default(),
        }
    }
}

fn default_start_node() -> String {
    DEFAULT_START_NODE.to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// Handling of failed browse requests below the start node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowseErrorPolicy {
    /// The first failure aborts the walk and no file is written.
    #[default]
    Abort,
    /// Failed subtrees are skipped and reported.
    Partial,
}

impl BrowseErrorPolicy {
    /// Returns the policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowseErrorPolicy::Abort => "abort",
            BrowseErrorPolicy::Partial => "partial",
        }
    }
}

impl fmt::Display for BrowseErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowseErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(BrowseErrorPolicy::Abort),
            "partial" => Ok(BrowseErrorPolicy::Partial),
            _ => Err(format!("unknown browse error policy '{}', expected abort or partial", s)),
        }
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Process-level behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Teardown behavior after a fatal error.
    #[serde(default)]
    pub exit_policy: ExitPolicy,
}

/// Teardown behavior after a fatal error during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitPolicy {
    /// Exit immediately without closing the session.
    #[default]
    #[serde(alias = "fail_fast")]
    FailFast,
    /// Close the session and disconnect before exiting.
    #[serde(alias = "best_effort")]
    BestEffort,
}

impl ExitPolicy {
    /// Returns the policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitPolicy::FailFast => "fail-fast",
            ExitPolicy::BestEffort => "best-effort",
        }
    }

    /// Returns `true` if teardown runs after a fatal walk error.
    pub fn tears_down_on_failure(&self) -> bool {
        matches!(self, ExitPolicy::BestEffort)
    }
}

impl fmt::Display for ExitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(ExitPolicy::FailFast),
            "best-effort" => Ok(ExitPolicy::BestEffort),
            _ => Err(format!(
                "unknown exit policy '{}', expected fail-fast or best-effort",
                s
            )),
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include span targets in logs.
    #[serde(default = "default_true")]
    pub with_target: bool,

    /// Include file/line in logs.
    #[serde(default)]
    pub with_file: bool,

    /// Include thread IDs in logs.
    #[serde(default)]
    pub with_thread_ids: bool,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            with_target: true,
            with_file: false,
            with_thread_ids: false,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the level as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level '{}'", s)),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Compact single-line text.
    Compact,
    /// JSON lines.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format '{}', expected text, compact or json", s)),
        }
    }
}

// =============================================================================
// Secret Value
// =============================================================================

/// A secret value that never shows up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    /// Creates a new secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value.
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}
