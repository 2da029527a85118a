// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Recursive, concurrent address-space walker.
//!
//! Starting from one node, every forward hierarchical reference is browsed.
//! Object children are expanded recursively; every other reference becomes a
//! [`PathRecord`].
//!
//! # Architecture
//!
//! ```text
//!                   browse(start)               prefix ""
//!                  /      |      \
//!          Object a   Variable x   Object b     ──▶ record "/x"
//!             │                       │
//!        browse(a)                browse(b)      children joined concurrently
//!        prefix "/a"              prefix "/b"
//!             │
//!        Variable y  ──▶ record "/a/y"
//!
//! records ──▶ mpsc channel ──▶ drained once the root future resolves
//! browse requests in flight ≤ max_concurrency (semaphore)
//! ```
//!
//! Record order is not deterministic; only the record set is stable between
//! walks of an unchanged address space. Nodes reachable through several
//! reference paths produce one record per path.
//!
//! # Examples
//!
//! ```rust,ignore
//! use uawalk_opcua::walker::{AddressSpaceWalker, WalkOptions};
//!
//! let walker = AddressSpaceWalker::new(transport, WalkOptions::default());
//! let outcome = walker.walk(&NodeId::OBJECTS_FOLDER).await?;
//! for record in &outcome.records {
//!     println!("{},{}", record.path, record.name);
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{try_join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, trace, warn};

use crate::client::OpcUaTransport;
use crate::error::{OpcUaError, OpcUaResult};
use crate::types::{join_path, BrowseNode, NodeId, PathRecord};

/// Default bound on concurrent browse requests.
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

// =============================================================================
// BrowseFailureMode
// =============================================================================

/// What the walker does when browsing a node below the start node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowseFailureMode {
    /// Abort the whole walk with the browse error.
    #[default]
    Abort,

    /// Skip the failed subtree, report it, and keep walking.
    Partial,
}

impl fmt::Display for BrowseFailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

// =============================================================================
// WalkOptions
// =============================================================================

/// Walk tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Maximum browse requests in flight (0 = unbounded).
    pub max_concurrency: usize,

    /// Deepest level whose Objects are still expanded (None = unlimited).
    ///
    /// Direct children of the start node are at depth 1.
    pub max_depth: Option<usize>,

    /// Behavior on a failed browse below the start node.
    pub failure_mode: BrowseFailureMode,
}

impl WalkOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Sets the depth limit.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the failure mode.
    pub fn with_failure_mode(mut self, failure_mode: BrowseFailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    fn expands(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_depth: None,
            failure_mode: BrowseFailureMode::Abort,
        }
    }
}

// =============================================================================
// WalkFailure / WalkStatistics / WalkOutcome
// =============================================================================

/// A subtree skipped in [`BrowseFailureMode::Partial`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkFailure {
    /// Path of the Object whose browse failed.
    pub path: String,
    /// Node whose browse failed.
    pub node_id: NodeId,
    /// Error code of the failure.
    pub error_code: String,
    /// Error message.
    pub message: String,
}

impl WalkFailure {
    fn new(path: &str, node_id: &NodeId, error: &OpcUaError) -> Self {
        Self {
            path: path.to_string(),
            node_id: node_id.clone(),
            error_code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for WalkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): [{}] {}", self.path, self.node_id, self.error_code, self.message)
    }
}

/// Live counters shared by all branches of one walk.
#[derive(Debug, Default)]
struct WalkCounters {
    browse_count: AtomicU64,
    references: AtomicU64,
    objects: AtomicU64,
    leaves: AtomicU64,
    truncated: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
}

impl WalkCounters {
    fn browse_started(&self) {
        self.browse_count.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn browse_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn snapshot(&self, failures: usize, elapsed: Duration) -> WalkStatistics {
        WalkStatistics {
            browse_count: self.browse_count.load(Ordering::Relaxed),
            references: self.references.load(Ordering::Relaxed),
            objects: self.objects.load(Ordering::Relaxed),
            leaves: self.leaves.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            failures: failures as u64,
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            elapsed,
        }
    }
}

/// Counters for a finished walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalkStatistics {
    /// Browse requests issued.
    pub browse_count: u64,
    /// References returned by all browse requests.
    pub references: u64,
    /// Object references expanded.
    pub objects: u64,
    /// Leaf references recorded.
    pub leaves: u64,
    /// Object references not expanded because of the depth limit.
    pub truncated: u64,
    /// Subtrees skipped after a failed browse.
    pub failures: u64,
    /// Highest number of browse requests in flight at once.
    pub peak_in_flight: u64,
    /// Wall time of the walk.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Result of a completed walk.
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Discovered leaf references, in no particular order.
    pub records: Vec<PathRecord>,
    /// Skipped subtrees (always empty in [`BrowseFailureMode::Abort`]).
    pub failures: Vec<WalkFailure>,
    /// Walk counters.
    pub stats: WalkStatistics,
}

impl WalkOutcome {
    /// Returns `true` if no subtree was skipped.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// AddressSpaceWalker
// =============================================================================

/// Walks the address space below a start node.
pub struct AddressSpaceWalker<T: OpcUaTransport> {
    transport: Arc<T>,
    options: WalkOptions,
}

impl<T: OpcUaTransport> AddressSpaceWalker<T> {
    /// Creates a walker over a transport with an open session.
    pub fn new(transport: Arc<T>, options: WalkOptions) -> Self {
        Self { transport, options }
    }

    /// Returns the walk options.
    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Walks every reference reachable from `start`.
    ///
    /// The start node itself is never recorded.
    ///
    /// # Errors
    ///
    /// A failed browse of `start` is always returned. A failed browse below it
    /// is returned in [`BrowseFailureMode::Abort`] and discards every record.
    pub async fn walk(&self, start: &NodeId) -> OpcUaResult<WalkOutcome> {
        let started = Instant::now();
        let (records_tx, mut records_rx) = mpsc::unbounded_channel();

        let limiter = match self.options.max_concurrency {
            0 => None,
            n => Some(Semaphore::new(n.min(Semaphore::MAX_PERMITS))),
        };

        let ctx = WalkContext {
            transport: self.transport.as_ref(),
            options: &self.options,
            limiter,
            records: records_tx,
            failures: Mutex::new(Vec::new()),
            counters: WalkCounters::default(),
        };

        debug!(
            start = %start,
            max_concurrency = self.options.max_concurrency,
            max_depth = ?self.options.max_depth,
            failure_mode = %self.options.failure_mode,
            "Walking address space"
        );

        browse_subtree(&ctx, start.clone(), String::new(), 0).await?;

        let WalkContext {
            records: records_tx,
            failures,
            counters,
            ..
        } = ctx;
        drop(records_tx);

        let mut records = Vec::new();
        while let Some(record) = records_rx.recv().await {
            records.push(record);
        }

        let failures = failures.into_inner();
        let stats = counters.snapshot(failures.len(), started.elapsed());

        debug!(
            records = records.len(),
            browses = stats.browse_count,
            objects = stats.objects,
            failures = stats.failures,
            peak_in_flight = stats.peak_in_flight,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Walk finished"
        );

        Ok(WalkOutcome {
            records,
            failures,
            stats,
        })
    }
}

impl<T: OpcUaTransport> fmt::Debug for AddressSpaceWalker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpaceWalker")
            .field("endpoint", &self.transport.endpoint())
            .field("options", &self.options)
            .finish()
    }
}

// =============================================================================
// Traversal
// =============================================================================

/// State shared by every branch of one walk.
struct WalkContext<'a, T: OpcUaTransport> {
    transport: &'a T,
    options: &'a WalkOptions,
    limiter: Option<Semaphore>,
    records: mpsc::UnboundedSender<PathRecord>,
    failures: Mutex<Vec<WalkFailure>>,
    counters: WalkCounters,
}

impl<T: OpcUaTransport> WalkContext<'_, T> {
    /// Issues one browse request, holding a permit only for its duration.
    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseNode>> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(limiter.acquire().await.map_err(|_| {
                OpcUaError::browse_failed(node_id.to_string(), "browse limiter closed")
            })?),
            None => None,
        };

        self.counters.browse_started();
        let result = self.transport.browse(node_id).await;
        self.counters.browse_finished();
        result
    }

    fn emit(&self, record: PathRecord) {
        self.counters.leaves.fetch_add(1, Ordering::Relaxed);
        // The receiver outlives every branch, so send cannot fail here.
        let _ = self.records.send(record);
    }
}

/// Browses `node` and everything below it, recording leaves under `prefix`.
fn browse_subtree<'a, T: OpcUaTransport>(
    ctx: &'a WalkContext<'a, T>,
    node: NodeId,
    prefix: String,
    depth: usize,
) -> BoxFuture<'a, OpcUaResult<()>> {
    async move {
        let children = match ctx.browse(&node).await {
            Ok(children) => children,
            Err(error) if depth > 0 && ctx.options.failure_mode == BrowseFailureMode::Partial => {
                warn!(
                    node_id = %node,
                    path = %prefix,
                    error_code = %error.error_code(),
                    "Browse failed, skipping subtree: {error}"
                );
                ctx.failures.lock().push(WalkFailure::new(&prefix, &node, &error));
                return Ok(());
            }
            Err(error) => {
                debug!(node_id = %node, path = %prefix, "Browse failed, aborting walk");
                return Err(error);
            }
        };

        trace!(node_id = %node, path = %prefix, children = children.len(), "Browsed node");
        ctx.counters
            .references
            .fetch_add(children.len() as u64, Ordering::Relaxed);

        let child_depth = depth + 1;
        let mut subtrees = Vec::new();
        for child in children {
            let path = join_path(&prefix, child.name());

            if !child.node_class.is_traversable() {
                ctx.emit(PathRecord {
                    path,
                    name: child.browse_name.name,
                });
                continue;
            }

            if !ctx.options.expands(child_depth) {
                ctx.counters.truncated.fetch_add(1, Ordering::Relaxed);
                trace!(node_id = %child.node_id, path = %path, "Depth limit reached");
                continue;
            }

            ctx.counters.objects.fetch_add(1, Ordering::Relaxed);
            subtrees.push(browse_subtree(ctx, child.node_id, path, child_depth));
        }

        try_join_all(subtrees).await?;
        Ok(())
    }
    .boxed()
}

// =============================================================================
// Tests
// =============================================================================
