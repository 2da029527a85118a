// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uawalk-config
//!
//! Configuration management for the uawalk address-space crawler.
//!
//! ## Features
//!
//! - **Schema Definition**: crawler settings with defaults and validation
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `UAWALK_*` variables override file values
//! - **Placeholders**: `${VAR}` and `${VAR:default}` inside config files
//!
//! ## Quick Start
//!
//! ```no_run
//! use uawalk_config::loader::load_config;
//!
//! let config = load_config("uawalk.yaml").unwrap();
//! println!("Endpoint: {}", config.connection.endpoint);
//! ```
//!
//! ## Configuration Schema
//!
//! - `connection` - endpoint, identity, security and connect retry
//! - `output` - CSV directory and file name
//! - `walk` - start node, concurrency, depth and browse error handling
//! - `runtime` - exit policy
//! - `logging` - level and format
//!
//! ```yaml
//! connection:
//!   endpoint: "${PLC_ENDPOINT:opc.tcp://localhost:4840}"
//!   username: operator
//! output:
//!   directory: /var/lib/uawalk
//! walk:
//!   max_concurrency: 16
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder};
pub use schema::{
    BrowseErrorPolicy, ConnectionConfig, CrawlerConfig, ExitPolicy, LogFormat, LogLevel,
    LoggingConfig, OutputConfig, RetrySettings, RuntimeConfig, SecretValue, SecurityMode,
    SecurityPolicy, WalkConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
