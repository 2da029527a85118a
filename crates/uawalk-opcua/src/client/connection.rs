// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection manager: connect with backoff, session setup and teardown.
//!
//! ```text
//! connect()          ──▶ transport.connect()   retried with exponential backoff
//! create_session()   ──▶ transport.create_session()   never retried
//! close_session()    ──▶ failure reported as SessionError::CloseFailed
//! disconnect()       ──▶ always attempted by the caller after close
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConnectionError, OpcUaError, OpcUaResult, SessionError};

use super::retry::RetryConfig;
use super::transport::{OpcUaTransport, TransportState};

// =============================================================================
// BackoffNotice
// =============================================================================

/// Emitted before each wait between connect attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffNotice {
    /// Endpoint being connected to.
    pub endpoint: String,
    /// Retry number (1 for the first retry).
    pub retry: u32,
    /// Delay before the next attempt.
    pub delay: Duration,
    /// Message of the failure that triggered the retry.
    pub error: String,
}

impl fmt::Display for BackoffNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Still trying to connect to {}: retry = {}, next attempt in {:.1} seconds",
            self.endpoint,
            self.retry,
            self.delay.as_secs_f64()
        )
    }
}

/// Callback invoked on every backoff.
pub type BackoffCallback = Arc<dyn Fn(&BackoffNotice) + Send + Sync>;

// =============================================================================
// ConnectionStats
// =============================================================================

/// Counters for connect attempts.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    attempts: AtomicU32,
    retries: AtomicU32,
    total_backoff_ms: AtomicU64,
}

impl ConnectionStats {
    /// Returns the number of connect attempts made.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Returns the number of retries made.
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Returns the total time spent waiting between attempts.
    pub fn total_backoff(&self) -> Duration {
        Duration::from_millis(self.total_backoff_ms.load(Ordering::Relaxed))
    }

    fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_retry(&self, delay: Duration) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.total_backoff_ms.fetch_add(millis, Ordering::Relaxed);
    }
}

// =============================================================================
// ConnectionManager
// =============================================================================

/// Drives connect, session creation and teardown for one transport.
///
/// # Examples
///
/// ```rust,ignore
/// let manager = ConnectionManager::new(transport, RetryConfig::default())
///     .with_backoff_callback(|notice| eprintln!("{notice}"));
/// manager.connect().await?;
/// manager.create_session().await?;
/// ```
pub struct ConnectionManager<T: OpcUaTransport> {
    transport: Arc<T>,
    retry: RetryConfig,
    on_backoff: Option<BackoffCallback>,
    stats: ConnectionStats,
}

impl<T: OpcUaTransport> ConnectionManager<T> {
    /// Creates a manager for the given transport.
    pub fn new(transport: Arc<T>, retry: RetryConfig) -> Self {
        Self {
            transport,
            retry,
            on_backoff: None,
            stats: ConnectionStats::default(),
        }
    }

    /// Registers a callback invoked on every backoff.
    pub fn with_backoff_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BackoffNotice) + Send + Sync + 'static,
    {
        self.on_backoff = Some(Arc::new(callback));
        self
    }

    /// Returns the shared transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the connect counters.
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Returns the current transport state.
    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    /// Connects to the endpoint, retrying retryable failures with backoff.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error unchanged, or
    /// [`ConnectionError::RetriesExhausted`] once the retry budget is spent.
    pub async fn connect(&self) -> OpcUaResult<()> {
        let endpoint = self.transport.endpoint().to_string();
        let backoff = self.retry.backoff();
        let mut retry = 0u32;

        loop {
            self.stats.record_attempt();
            tracing::debug!(endpoint = %endpoint, attempt = retry + 1, "Connecting");

            let error = match self.transport.connect().await {
                Ok(()) => {
                    tracing::debug!(
                        endpoint = %endpoint,
                        attempts = retry + 1,
                        "Transport connected"
                    );
                    return Ok(());
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if retry >= self.retry.max_retries {
                return Err(OpcUaError::connection(ConnectionError::retries_exhausted(
                    endpoint,
                    retry + 1,
                    error,
                )));
            }

            let delay = backoff.delay(retry);
            retry += 1;

            let notice = BackoffNotice {
                endpoint: endpoint.clone(),
                retry,
                delay,
                error: error.to_string(),
            };
            tracing::warn!(error = %error, "{notice}");
            if let Some(callback) = &self.on_backoff {
                callback(&notice);
            }

            self.stats.record_retry(delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Creates and activates a session on the connected transport.
    ///
    /// Failures are never retried.
    pub async fn create_session(&self) -> OpcUaResult<()> {
        if !self.transport.state().is_connected() {
            return Err(OpcUaError::not_connected());
        }

        self.transport.create_session().await.map_err(|error| match error {
            OpcUaError::Session(_) => error,
            other => OpcUaError::session(SessionError::creation_failed(other.to_string())),
        })
    }

    /// Closes the session.
    ///
    /// Any failure is reported as [`SessionError::CloseFailed`].
    pub async fn close_session(&self) -> OpcUaResult<()> {
        self.transport.close_session().await.map_err(|error| match error {
            OpcUaError::Session(SessionError::CloseFailed { .. }) => error,
            other => OpcUaError::session(SessionError::close_failed(other.to_string())),
        })
    }

    /// Closes the transport connection.
    pub async fn disconnect(&self) -> OpcUaResult<()> {
        self.transport.disconnect().await
    }

    /// Closes the session then disconnects, regardless of the close outcome.
    ///
    /// Returns the errors of both steps; neither stops the other.
    pub async fn shutdown(&self) -> Teardown {
        let close = self.close_session().await.err();
        if let Some(error) = &close {
            error.log("session-closing");
        }

        let disconnect = self.disconnect().await.err();
        if let Some(error) = &disconnect {
            error.log("disconnecting");
        }

        Teardown { close, disconnect }
    }
}

impl<T: OpcUaTransport> fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.transport.endpoint())
            .field("state", &self.transport.state())
            .field("retry", &self.retry)
            .field("stats", &self.stats)
            .finish()
    }
}

// =============================================================================
// Teardown
// =============================================================================

/// Outcome of [`ConnectionManager::shutdown`].
#[derive(Debug, Default)]
pub struct Teardown {
    /// Error from closing the session.
    pub close: Option<OpcUaError>,
    /// Error from disconnecting.
    pub disconnect: Option<OpcUaError>,
}

impl Teardown {
    /// Returns `true` if both steps succeeded.
    pub fn is_clean(&self) -> bool {
        self.close.is_none() && self.disconnect.is_none()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BrowseNode, NodeId};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Transport whose connect results are scripted per attempt.
    struct ScriptedTransport {
        connects: Mutex<VecDeque<OpcUaResult<()>>>,
        state: Mutex<TransportState>,
        close_fails: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedTransport {
        fn new(connects: Vec<OpcUaResult<()>>) -> Self {
            Self {
                connects: Mutex::new(connects.into()),
                state: Mutex::new(TransportState::Disconnected),
                close_fails: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OpcUaTransport for ScriptedTransport {
        async fn connect(&self) -> OpcUaResult<()> {
            self.calls.lock().push("connect");
            let result = self.connects.lock().pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                *self.state.lock() = TransportState::Connected;
            }
            result
        }

        async fn create_session(&self) -> OpcUaResult<()> {
            self.calls.lock().push("create_session");
            *self.state.lock() = TransportState::SessionOpen;
            Ok(())
        }

        async fn browse(&self, _node_id: &NodeId) -> OpcUaResult<Vec<BrowseNode>> {
            Ok(Vec::new())
        }

        async fn close_session(&self) -> OpcUaResult<()> {
            self.calls.lock().push("close_session");
            if self.close_fails {
                return Err(OpcUaError::browse_failed("i=0", "BadSessionIdInvalid"));
            }
            Ok(())
        }

        async fn disconnect(&self) -> OpcUaResult<()> {
            self.calls.lock().push("disconnect");
            *self.state.lock() = TransportState::Disconnected;
            Ok(())
        }

        fn state(&self) -> TransportState {
            *self.state.lock()
        }

        fn endpoint(&self) -> &str {
            "opc.tcp://test:4840"
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig::exponential(max_retries, Duration::from_millis(10), Duration::from_millis(40))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(OpcUaError::connection_refused("opc.tcp://test:4840")),
            Err(OpcUaError::connection_refused("opc.tcp://test:4840")),
            Ok(()),
        ]));

        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        let manager = ConnectionManager::new(transport, fast_retry(5))
            .with_backoff_callback(move |n| sink.lock().push((n.retry, n.delay)));

        manager.connect().await.unwrap();

        assert_eq!(manager.stats().attempts(), 3);
        assert_eq!(manager.stats().retries(), 2);
        assert_eq!(
            *notices.lock(),
            vec![(1, Duration::from_millis(10)), (2, Duration::from_millis(20))]
        );
        assert_eq!(manager.state(), TransportState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_non_retryable_fails_immediately() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(OpcUaError::connection(
            ConnectionError::invalid_endpoint("opc.tcp://", "missing host"),
        ))]));
        let manager = ConnectionManager::new(transport, fast_retry(5));

        let error = manager.connect().await.unwrap_err();
        assert!(matches!(
            error,
            OpcUaError::Connection(ConnectionError::InvalidEndpoint { .. })
        ));
        assert_eq!(manager.stats().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_exhausts_retries() {
        let transport = Arc::new(ScriptedTransport::new(
            (0..4)
                .map(|_| Err(OpcUaError::connection_refused("opc.tcp://test:4840")))
                .collect(),
        ));
        let manager = ConnectionManager::new(transport, fast_retry(2));

        let error = manager.connect().await.unwrap_err();
        assert!(matches!(
            error,
            OpcUaError::Connection(ConnectionError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(manager.stats().attempts(), 3);
        assert_eq!(manager.stats().total_backoff(), Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_create_session_requires_connection() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let manager = ConnectionManager::new(transport, RetryConfig::no_retry());

        let error = manager.create_session().await.unwrap_err();
        assert!(matches!(error, OpcUaError::Session(SessionError::NotConnected)));
        assert_eq!(error.level(), tracing::Level::ERROR);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_after_close_failure() {
        let mut transport = ScriptedTransport::new(vec![]);
        transport.close_fails = true;
        let transport = Arc::new(transport);
        let manager = ConnectionManager::new(transport.clone(), RetryConfig::no_retry());

        manager.connect().await.unwrap();
        manager.create_session().await.unwrap();
        let teardown = manager.shutdown().await;

        assert!(!teardown.is_clean());
        assert!(matches!(
            teardown.close,
            Some(OpcUaError::Session(SessionError::CloseFailed { .. }))
        ));
        assert!(teardown.disconnect.is_none());
        assert_eq!(
            *transport.calls.lock(),
            vec!["connect", "create_session", "close_session", "disconnect"]
        );
    }

    #[test]
    fn test_backoff_notice_message() {
        let notice = BackoffNotice {
            endpoint: "opc.tcp://plc:4840".into(),
            retry: 2,
            delay: Duration::from_millis(2500),
            error: "refused".into(),
        };
        assert_eq!(
            notice.to_string(),
            "Still trying to connect to opc.tcp://plc:4840: retry = 2, next attempt in 2.5 seconds"
        );
    }
}
