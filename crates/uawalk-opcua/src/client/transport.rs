// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The walker and the connection manager only see [`OpcUaTransport`], so the
//! crawl can run against the `opcua`-backed transport or an in-memory mock.

use std::fmt;

use async_trait::async_trait;

use crate::error::OpcUaResult;
use crate::types::{BrowseNode, NodeId};

/// Connection and session state of a transport.
///
/// ```text
/// Disconnected ─▶ Connecting ─▶ Connected ─▶ SessionOpen ─▶ Closing ─▶ Disconnected
///                     │             │             │
///                     └─────────────┴─────────────┴──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Transport is not connected.
    #[default]
    Disconnected,

    /// Transport is establishing connection.
    Connecting,

    /// Transport is connected, no session yet.
    Connected,

    /// A session is created and activated.
    SessionOpen,

    /// The session is being closed.
    Closing,

    /// A fatal error occurred.
    Failed,
}

impl TransportState {
    /// Returns `true` if the transport is connected, with or without session.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::SessionOpen | Self::Closing)
    }

    /// Returns `true` if browse requests can be issued.
    #[inline]
    pub fn has_session(&self) -> bool {
        matches!(self, Self::SessionOpen)
    }

    /// State name as used in log fields.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::SessionOpen => "SessionOpen",
            Self::Closing => "Closing",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OpcUaTransport Trait
// =============================================================================

/// Abstract transport for one OPC UA server.
///
/// All methods take `&self`; implementations keep their state behind interior
/// locks so a single session can serve many concurrent browse requests.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    /// Opens the transport connection to the endpoint.
    ///
    /// Called once per attempt by the connection manager; retryable errors
    /// trigger backoff.
    async fn connect(&self) -> OpcUaResult<()>;

    /// Creates and activates a session on the open connection.
    async fn create_session(&self) -> OpcUaResult<()>;

    /// Returns every forward hierarchical reference of `node_id`.
    ///
    /// Implementations follow continuation points so the result is complete.
    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseNode>>;

    /// Closes the session.
    async fn close_session(&self) -> OpcUaResult<()>;

    /// Closes the transport connection.
    async fn disconnect(&self) -> OpcUaResult<()>;

    /// Returns the current transport state.
    fn state(&self) -> TransportState;

    /// Returns the server endpoint URL.
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: OpcUaTransport + ?Sized> OpcUaTransport for std::sync::Arc<T> {
    async fn connect(&self) -> OpcUaResult<()> {
        (**self).connect().await
    }

    async fn create_session(&self) -> OpcUaResult<()> {
        (**self).create_session().await
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseNode>> {
        (**self).browse(node_id).await
    }

    async fn close_session(&self) -> OpcUaResult<()> {
        (**self).close_session().await
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        (**self).disconnect().await
    }

    fn state(&self) -> TransportState {
        (**self).state()
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Connected.is_connected());
        assert!(TransportState::SessionOpen.is_connected());
        assert!(!TransportState::Disconnected.is_connected());
        assert!(!TransportState::Failed.is_connected());

        assert!(TransportState::SessionOpen.has_session());
        assert!(!TransportState::Connected.has_session());
    }

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::default().to_string(), "Disconnected");
        assert_eq!(TransportState::SessionOpen.to_string(), "SessionOpen");
    }
}
