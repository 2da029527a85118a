// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Crawl lifecycle orchestration.
//!
//! ```text
//! connecting → session → walking → writing → session-closing → disconnected
//! ```
//!
//! Every stage failure is fatal and returned as a [`BinError`] carrying the
//! stage. With [`ExitPolicy::FailFast`] no later stage runs; with
//! [`ExitPolicy::BestEffort`] the session is still closed and the connection
//! dropped before the error is returned. A failed session close on the
//! success path is logged and never stops the disconnect.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use uawalk_config::ExitPolicy;
use uawalk_opcua::{
    AddressSpaceWalker, BackoffNotice, ConnectionManager, NodeId, OpcUaTransport, WalkFailure,
    WalkStatistics,
};

use crate::error::{BinError, BinResult, Stage};
use crate::settings::CrawlSettings;
use crate::sink::CsvSink;

// =============================================================================
// CrawlSummary
// =============================================================================

/// Result of a successful crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    /// When the crawl started.
    pub started_at: DateTime<Utc>,
    /// Endpoint that was crawled.
    pub endpoint: String,
    /// Written CSV file.
    pub output: PathBuf,
    /// Number of rows written.
    pub records: usize,
    /// Subtrees skipped in partial mode.
    pub failures: Vec<WalkFailure>,
    /// Walk counters.
    pub stats: WalkStatistics,
    /// Connect retries needed.
    pub connect_retries: u32,
    /// Whether session close and disconnect both succeeded.
    pub clean_shutdown: bool,
    /// Total run time in milliseconds.
    pub elapsed_ms: u64,
}

impl CrawlSummary {
    /// Returns `true` if every subtree was walked.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// CrawlRuntime
// =============================================================================

/// Runs one crawl against a transport.
pub struct CrawlRuntime<T: OpcUaTransport> {
    manager: ConnectionManager<T>,
    walker: AddressSpaceWalker<T>,
    sink: CsvSink,
    start_node: NodeId,
    exit_policy: ExitPolicy,
}

impl<T: OpcUaTransport> CrawlRuntime<T> {
    /// Creates a runtime over `transport`.
    pub fn new(transport: Arc<T>, settings: CrawlSettings) -> Self {
        let manager = ConnectionManager::new(Arc::clone(&transport), settings.client.retry.clone());
        let walker = AddressSpaceWalker::new(transport, settings.walk);

        Self {
            manager,
            walker,
            sink: settings.sink,
            start_node: settings.start_node,
            exit_policy: settings.exit_policy,
        }
    }

    /// Registers a callback invoked before every connect retry.
    pub fn with_backoff_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BackoffNotice) + Send + Sync + 'static,
    {
        self.manager = self.manager.with_backoff_callback(callback);
        self
    }

    /// Returns the connection manager.
    pub fn manager(&self) -> &ConnectionManager<T> {
        &self.manager
    }

    /// Returns the exit policy.
    pub fn exit_policy(&self) -> ExitPolicy {
        self.exit_policy
    }

    /// Runs connect, session, walk, write and teardown.
    pub async fn run(&self) -> BinResult<CrawlSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let endpoint = self.manager.transport().endpoint().to_string();

        info!(endpoint = %endpoint, "Connecting");
        if let Err(e) = self.manager.connect().await {
            return Err(self.fail(BinError::opcua(Stage::Connecting, e)).await);
        }
        info!("Connected");

        if let Err(e) = self.manager.create_session().await {
            return Err(self.fail(BinError::opcua(Stage::Session, e)).await);
        }
        info!("Session created");

        let outcome = match self.walker.walk(&self.start_node).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(BinError::opcua(Stage::Walking, e)).await),
        };
        for failure in &outcome.failures {
            warn!(
                path = %failure.path,
                node_id = %failure.node_id,
                error_code = %failure.error_code,
                "Skipped subtree: {}",
                failure.message
            );
        }

        info!(records = outcome.records.len(), "Reading completed. Writing file...");
        let output = match self.sink.write(&outcome.records) {
            Ok(path) => path,
            Err(e) => return Err(self.fail(BinError::from(e)).await),
        };
        info!(path = %output.display(), "File saved");

        let teardown = self.manager.shutdown().await;
        if teardown.close.is_none() {
            info!("Session closed");
        }

        let summary = CrawlSummary {
            started_at,
            endpoint,
            output,
            records: outcome.records.len(),
            failures: outcome.failures,
            stats: outcome.stats,
            connect_retries: self.manager.stats().retries(),
            clean_shutdown: teardown.is_clean(),
            elapsed_ms: clock.elapsed().as_millis() as u64,
        };

        info!(
            records = summary.records,
            failures = summary.failures.len(),
            browses = summary.stats.browse_count,
            elapsed_ms = summary.elapsed_ms,
            "Crawl finished"
        );
        Ok(summary)
    }

    /// Logs a fatal error and applies the exit policy.
    async fn fail(&self, error: BinError) -> BinError {
        error.log();

        if !self.exit_policy.tears_down_on_failure() {
            debug!(policy = %self.exit_policy, "Skipping teardown");
            return error;
        }

        match error.stage() {
            Some(Stage::Connecting) => {}
            Some(Stage::Session) => {
                if let Err(e) = self.manager.disconnect().await {
                    e.log("disconnecting");
                }
            }
            _ => {
                let teardown = self.manager.shutdown().await;
                if teardown.close.is_none() {
                    info!("Session closed");
                }
            }
        }
        error
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for CrawlRuntime<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlRuntime")
            .field("manager", &self.manager)
            .field("sink", &self.sink)
            .field("start_node", &self.start_node)
            .field("exit_policy", &self.exit_policy)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
