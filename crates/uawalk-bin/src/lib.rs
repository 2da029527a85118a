// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uawalk-bin
//!
//! CLI binary for the uawalk OPC UA address-space crawler.
//!
//! This crate provides the binary entry point, including:
//!
//! - CLI argument parsing with clap
//! - Crawl lifecycle orchestration
//! - CSV result sink
//! - Logging initialization
//!
//! ## Architecture
//!
//! ```text
//!            main.rs
//!               │
//!         ┌─────▼─────┐
//!         │  cli.rs   │──▶ uawalk-config
//!         └─────┬─────┘
//!               │
//!      ┌────────┼─────────┐
//!      ▼        ▼         ▼
//!  settings  logging   runtime ──▶ uawalk-opcua
//!                         │
//!                      ┌──▼──┐
//!                      │sink │
//!                      └─────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Anonymous crawl of a local server into ./nodes.csv
//! uawalk -h opc.tcp://localhost:4840
//!
//! # Credentials, output location and a config file
//! uawalk -u operator -p secret -l /var/lib/uawalk -f plant.csv -c uawalk.yaml
//!
//! # Keep going past failed subtrees
//! uawalk --partial-results --exit-policy best-effort
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod settings;
pub mod sink;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::Cli;
pub use error::{report_error, report_error_and_exit, BinError, BinResult, Stage};
pub use logging::init_logging;
pub use runtime::{CrawlRuntime, CrawlSummary};
pub use settings::CrawlSettings;
pub use sink::{CsvSink, SinkError, CSV_HEADER};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Runs one crawl against the server described by `settings`.
#[cfg(feature = "real-transport")]
pub async fn crawl(settings: CrawlSettings) -> BinResult<CrawlSummary> {
    use std::sync::Arc;
    use uawalk_opcua::RealOpcUaTransport;

    let transport = Arc::new(RealOpcUaTransport::new(settings.client.clone()));
    CrawlRuntime::new(transport, settings).run().await
}

/// Runs one crawl against the server described by `settings`.
#[cfg(not(feature = "real-transport"))]
pub async fn crawl(_settings: CrawlSettings) -> BinResult<CrawlSummary> {
    Err(BinError::runtime(
        "uawalk was built without the `real-transport` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "uawalk-bin");
    }
}
