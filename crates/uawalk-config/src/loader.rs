// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for uawalk.
//!
//! # Loading Pipeline
//!
//! 1. Read the file (YAML, TOML or JSON by extension)
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders
//! 3. Deserialize into [`CrawlerConfig`]
//! 4. Apply `UAWALK_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UAWALK_ENDPOINT=opc.tcp://plc:4840
//! UAWALK_USERNAME=operator
//! UAWALK_PASSWORD=secret
//! UAWALK_OUTPUT_DIR=/var/lib/uawalk
//! UAWALK_OUTPUT_FILE=nodes.csv
//! UAWALK_START_NODE=ns=2;s=Line1
//! UAWALK_MAX_CONCURRENCY=16
//! UAWALK_MAX_DEPTH=8
//! UAWALK_ON_BROWSE_ERROR=partial
//! UAWALK_EXIT_POLICY=best-effort
//! UAWALK_LOG_LEVEL=debug
//! UAWALK_LOG_FORMAT=json
//! ```

use crate::error::{ConfigError, ConfigResult, INLINE_ORIGIN};
use crate::schema::{CrawlerConfig, SecretValue};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "UAWALK";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for uawalk.
///
/// # Examples
///
/// ```no_run
/// use uawalk_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load_optional("uawalk.yaml").unwrap();
/// println!("endpoint: {}", config.connection.endpoint);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Returns the environment variable prefix.
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<CrawlerConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config: CrawlerConfig = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!(
            endpoint = %config.connection.endpoint,
            output = %config.output.target_path().display(),
            "Effective configuration"
        );

        Ok(config)
    }

    /// Loads configuration from a file if it exists, else from defaults.
    ///
    /// Environment overrides and validation apply either way.
    pub fn load_optional(&self, path: impl AsRef<Path>) -> ConfigResult<CrawlerConfig> {
        let path = path.as_ref();
        if path.exists() {
            return self.load(path);
        }

        debug!("No configuration file at {}, using defaults", path.display());
        self.load_defaults()
    }

    /// Builds the default configuration with environment overrides applied.
    pub fn load_defaults(&self) -> ConfigResult<CrawlerConfig> {
        let mut config = CrawlerConfig::default();
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<CrawlerConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)?
        } else {
            content.to_string()
        };
        let mut config = parse_str(&content, format, INLINE_ORIGIN)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Reads file content.
    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))
    }

    /// Parses content based on format.
    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<CrawlerConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)?
        } else {
            content.to_string()
        };

        parse_str(&content, format, &path.display().to_string())
    }

    /// Resolves environment variable placeholders in content.
    ///
    /// Supports the format: `${VAR_NAME}` or `${VAR_NAME:default}`
    fn resolve_env_placeholders(&self, content: &str) -> ConfigResult<String> {
        Ok(resolve_placeholders_with(content, |name| env::var(name).ok()))
    }

    /// Applies `{prefix}_*` environment overrides.
    pub fn apply_env_overrides(&self, config: &mut CrawlerConfig) -> ConfigResult<()> {
        self.apply_overrides_from(config, |name| env::var(name).ok())
    }

    /// Applies overrides read through `lookup` instead of the process environment.
    pub fn apply_overrides_from<F>(&self, config: &mut CrawlerConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        if let Some(value) = lookup(&key("ENDPOINT")) {
            config.connection.endpoint = value;
        }
        if let Some(value) = lookup(&key("USERNAME")) {
            config.connection.username = Some(value);
        }
        if let Some(value) = lookup(&key("PASSWORD")) {
            config.connection.password = Some(SecretValue::new(value));
        }
        if let Some(value) = lookup(&key("SECURITY_MODE")) {
            config.connection.security_mode = parse_env(&key("SECURITY_MODE"), &value)?;
        }
        if let Some(value) = lookup(&key("SECURITY_POLICY")) {
            config.connection.security_policy = parse_env(&key("SECURITY_POLICY"), &value)?;
        }
        if let Some(value) = lookup(&key("MAX_RETRIES")) {
            config.connection.retry.max_retries = parse_env(&key("MAX_RETRIES"), &value)?;
        }

        if let Some(value) = lookup(&key("OUTPUT_DIR")) {
            config.output.directory = PathBuf::from(value);
        }
        if let Some(value) = lookup(&key("OUTPUT_FILE")) {
            config.output.file_name = value;
        }

        if let Some(value) = lookup(&key("START_NODE")) {
            config.walk.start_node = value;
        }
        if let Some(value) = lookup(&key("MAX_CONCURRENCY")) {
            config.walk.max_concurrency = parse_env(&key("MAX_CONCURRENCY"), &value)?;
        }
        if let Some(value) = lookup(&key("MAX_DEPTH")) {
            config.walk.max_depth = if value.is_empty() {
                None
            } else {
                Some(parse_env(&key("MAX_DEPTH"), &value)?)
            };
        }
        if let Some(value) = lookup(&key("ON_BROWSE_ERROR")) {
            config.walk.on_browse_error = parse_env(&key("ON_BROWSE_ERROR"), &value)?;
        }

        if let Some(value) = lookup(&key("EXIT_POLICY")) {
            config.runtime.exit_policy = parse_env(&key("EXIT_POLICY"), &value)?;
        }

        if let Some(value) = lookup(&key("LOG_LEVEL")) {
            config.logging.level = parse_env(&key("LOG_LEVEL"), &value)?;
        }
        if let Some(value) = lookup(&key("LOG_FORMAT")) {
            config.logging.format = parse_env(&key("LOG_FORMAT"), &value)?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for ConfigLoader.
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment variable prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Builds the loader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(enabled) = self.resolve_env_vars {
            loader.resolve_env_vars = enabled;
        }
        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unknown_format(other)),
            None => Err(ConfigError::unknown_format("")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    /// Returns the format name used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parses `content` as `format`; `origin` names the source in errors.
fn parse_str(content: &str, format: ConfigFormat, origin: &str) -> ConfigResult<CrawlerConfig> {
    let malformed = |message: String| ConfigError::malformed(origin, format.name(), message);
    match format {
        ConfigFormat::Yaml => yaml_parse(content).map_err(|e| malformed(e.to_string())),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| malformed(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| malformed(e.to_string())),
    }
}

/// YAML parsing through the `config` crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> Result<T, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()?
        .try_deserialize()
}

/// Parses an override value, naming the variable on failure.
fn parse_env<T>(name: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::bad_override(name, e))
}

/// Replaces `${VAR}` and `${VAR:default}` using `lookup`.
///
/// Unknown variables without a default and unterminated placeholders are
/// kept verbatim.
fn resolve_placeholders_with<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || chars.peek() != Some(&'{') {
            result.push(c);
            continue;
        }
        chars.next();

        let mut var_content = String::new();
        let mut found_close = false;
        for c in chars.by_ref() {
            if c == '}' {
                found_close = true;
                break;
            }
            var_content.push(c);
        }

        if !found_close {
            result.push_str("${");
            result.push_str(&var_content);
            continue;
        }

        let (var_name, default_value) = match var_content.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (var_content.as_str(), None),
        };

        match (lookup(var_name), default_value) {
            (Some(value), _) => result.push_str(&value),
            (None, Some(default)) => result.push_str(default),
            (None, None) => {
                warn!("Environment variable '{}' not found", var_name);
                result.push_str(&format!("${{{}}}", var_name));
            }
        }
    }

    result
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<CrawlerConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<CrawlerConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BrowseErrorPolicy, ExitPolicy, LogFormat, LogLevel, SecurityMode};
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn test_loader() -> ConfigLoader {
        // A prefix nothing in the test environment sets.
        ConfigLoader::new().with_env_prefix("UAWALK_LOADER_TEST")
    }

    fn create_test_yaml() -> String {
        r#"
connection:
  endpoint: opc.tcp://plc.local:4840
  username: operator
  password: secret
  session_timeout: 30s
  retry:
    max_retries: 2
    initial_delay: 500ms

output:
  directory: /tmp
  file_name: inventory.csv

walk:
  max_concurrency: 8
  on_browse_error: partial

runtime:
  exit_policy: best-effort

logging:
  level: debug
  format: json
"#
        .to_string()
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(create_test_yaml().as_bytes()).unwrap();

        let config = test_loader().load(file.path()).unwrap();

        assert_eq!(config.connection.endpoint, "opc.tcp://plc.local:4840");
        assert_eq!(config.connection.effective_username(), Some("operator"));
        assert_eq!(config.connection.password.as_ref().map(|p| p.raw()), Some("secret"));
        assert_eq!(config.connection.session_timeout, Duration::from_secs(30));
        assert_eq!(config.connection.retry.max_retries, 2);
        assert_eq!(config.connection.retry.initial_delay, Duration::from_millis(500));
        assert_eq!(config.output.target_path(), PathBuf::from("/tmp/inventory.csv"));
        assert_eq!(config.walk.max_concurrency, 8);
        assert_eq!(config.walk.on_browse_error, BrowseErrorPolicy::Partial);
        assert_eq!(config.walk.start_node, "ObjectsFolder");
        assert_eq!(config.runtime.exit_policy, ExitPolicy::BestEffort);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[connection]
endpoint = "opc.tcp://10.0.0.5:4840"
security_mode = "Sign"
security_policy = "Basic256Sha256"

[walk]
start_node = "ns=2;s=Line1"
max_depth = 4
"#;
        let config = test_loader().load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.connection.security_mode, SecurityMode::Sign);
        assert_eq!(config.walk.start_node, "ns=2;s=Line1");
        assert_eq!(config.walk.max_depth, Some(4));
        assert_eq!(config.output.file_name, "nodes.csv");
    }

    #[test]
    fn test_load_json() {
        let json = r#"{ "output": { "directory": "out", "file_name": "a.csv" } }"#;
        let config = test_loader().load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.output.target_path(), PathBuf::from("out/a.csv"));
        assert_eq!(config.connection.endpoint, "opc.tcp://localhost:4840");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let json = r#"{ "walk": { "max_concurency": 4 } }"#;
        let result = test_loader().load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Malformed { origin, .. }) if origin == INLINE_ORIGIN));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let json = r#"{ "walk": { "max_concurrency": 5000 } }"#;
        let result = test_loader().load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = test_loader().load("/nonexistent/uawalk.yaml");
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_optional_falls_back_to_defaults() {
        let config = test_loader()
            .load_optional("/nonexistent/uawalk.yaml")
            .unwrap();
        assert_eq!(config.output.file_name, "nodes.csv");
        assert_eq!(config.walk.max_concurrency, 32);
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = test_loader().load(file.path());
        match result {
            Err(ConfigError::Malformed { origin, format, .. }) => {
                assert_eq!(origin, file.path().display().to_string());
                assert_eq!(format, "JSON");
            }
            other => panic!("Expected Malformed error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("uawalk.yaml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("uawalk.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("uawalk.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("uawalk.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("uawalk.txt")).is_err());
        assert!(ConfigFormat::from_path(Path::new("uawalk")).is_err());
    }

    #[test]
    fn test_placeholder_resolution() {
        let vars: HashMap<&str, &str> = [("PLC_HOST", "10.1.1.1")].into_iter().collect();
        let lookup = |name: &str| vars.get(name).map(|v| v.to_string());

        assert_eq!(
            resolve_placeholders_with("endpoint: opc.tcp://${PLC_HOST}:4840", lookup),
            "endpoint: opc.tcp://10.1.1.1:4840"
        );
        assert_eq!(
            resolve_placeholders_with("user: ${PLC_USER:anonymous}", lookup),
            "user: anonymous"
        );
        assert_eq!(
            resolve_placeholders_with("user: ${PLC_USER}", lookup),
            "user: ${PLC_USER}"
        );
        assert_eq!(resolve_placeholders_with("cost: ${5", lookup), "cost: ${5");
        assert_eq!(resolve_placeholders_with("price: $5", lookup), "price: $5");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<String, String> = [
            ("UAWALK_ENDPOINT", "opc.tcp://override:4840"),
            ("UAWALK_USERNAME", "admin"),
            ("UAWALK_OUTPUT_FILE", "override.csv"),
            ("UAWALK_MAX_CONCURRENCY", "4"),
            ("UAWALK_MAX_DEPTH", "2"),
            ("UAWALK_EXIT_POLICY", "best-effort"),
            ("UAWALK_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = CrawlerConfig::default();
        ConfigLoader::new()
            .apply_overrides_from(&mut config, |name| vars.get(name).cloned())
            .unwrap();

        assert_eq!(config.connection.endpoint, "opc.tcp://override:4840");
        assert_eq!(config.connection.effective_username(), Some("admin"));
        assert_eq!(config.output.file_name, "override.csv");
        assert_eq!(config.walk.max_concurrency, 4);
        assert_eq!(config.walk.max_depth, Some(2));
        assert_eq!(config.runtime.exit_policy, ExitPolicy::BestEffort);
        assert_eq!(config.logging.level, LogLevel::Trace);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = CrawlerConfig::default();
        let result = ConfigLoader::new().apply_overrides_from(&mut config, |name| {
            (name == "UAWALK_MAX_CONCURRENCY").then(|| "many".to_string())
        });
        match result {
            Err(ConfigError::BadOverride { variable, .. }) => {
                assert_eq!(variable, "UAWALK_MAX_CONCURRENCY")
            }
            other => panic!("Expected BadOverride, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_log_level_override() {
        let mut config = CrawlerConfig::default();
        let result = ConfigLoader::new().apply_overrides_from(&mut config, |name| {
            (name == "UAWALK_LOG_LEVEL").then(|| "loud".to_string())
        });
        match result {
            Err(ConfigError::BadOverride { variable, reason }) => {
                assert_eq!(variable, "UAWALK_LOG_LEVEL");
                assert!(reason.contains("loud"));
            }
            other => panic!("Expected BadOverride, got {:?}", other),
        }
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_loader_builder() {
        let loader = ConfigLoader::builder()
            .env_prefix("CRAWLER")
            .resolve_env_vars(false)
            .build();
        assert_eq!(loader.env_prefix(), "CRAWLER");
        assert!(!loader.resolve_env_vars);
    }
}
