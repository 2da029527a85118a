// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! [`MockAddressSpace`] serves browse requests from an in-memory tree and
//! records every transport call, so tests can check results, call order and
//! the number of concurrent browse requests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use uawalk_opcua::{
    BrowseError, BrowseNode, ConnectionError, NodeId, OpcUaError, OpcUaResult, OpcUaTransport,
    SessionError, TransportState,
};

/// Endpoint reported by the mock.
pub const MOCK_ENDPOINT: &str = "opc.tcp://mock:4840";

/// Status code returned for injected browse failures (BadNodeIdUnknown).
pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;

// =============================================================================
// MockCall
// =============================================================================

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `connect`
    Connect,
    /// `create_session`
    CreateSession,
    /// `browse` of the given node
    Browse(NodeId),
    /// `close_session`
    CloseSession,
    /// `disconnect`
    Disconnect,
}

impl MockCall {
    /// Returns `true` for browse calls.
    pub fn is_browse(&self) -> bool {
        matches!(self, Self::Browse(_))
    }
}

// =============================================================================
// AddressSpaceBuilder
// =============================================================================

/// Builds the tree served by a [`MockAddressSpace`].
#[derive(Debug, Default, Clone)]
pub struct AddressSpaceBuilder {
    children: HashMap<NodeId, Vec<BrowseNode>>,
}

impl AddressSpaceBuilder {
    /// Creates an empty address space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an Object `name` below `parent` and returns its node id.
    pub fn object(&mut self, parent: &NodeId, name: &str) -> NodeId {
        let id = node_id_for(parent, name);
        self.reference(parent, BrowseNode::object(id.clone(), name));
        id
    }

    /// Adds a Variable `name` below `parent` and returns its node id.
    pub fn variable(&mut self, parent: &NodeId, name: &str) -> NodeId {
        let id = node_id_for(parent, name);
        self.reference(parent, BrowseNode::variable(id.clone(), name));
        id
    }

    /// Adds an arbitrary reference below `parent`.
    pub fn reference(&mut self, parent: &NodeId, node: BrowseNode) -> &mut Self {
        self.children.entry(parent.clone()).or_default().push(node);
        self
    }

    /// Builds the mock transport.
    pub fn build(self) -> MockAddressSpace {
        MockAddressSpace::new(self.children)
    }
}

/// Derives a unique string node id from the parent id and child name.
fn node_id_for(parent: &NodeId, name: &str) -> NodeId {
    match parent.as_string() {
        Some(prefix) => NodeId::string(2, format!("{}.{}", prefix, name)),
        None => NodeId::string(2, name),
    }
}

// =============================================================================
// MockAddressSpace
// =============================================================================

/// In-memory OPC UA server.
#[derive(Debug)]
pub struct MockAddressSpace {
    children: HashMap<NodeId, Vec<BrowseNode>>,
    state: Mutex<TransportState>,
    calls: Mutex<Vec<MockCall>>,

    /// Nodes whose browse fails.
    failing_browses: Mutex<HashSet<NodeId>>,
    /// Number of connect attempts still to fail.
    connect_failures: AtomicU32,
    fail_session: AtomicBool,
    fail_close: AtomicBool,
    fail_disconnect: AtomicBool,

    /// Delay of each browse; zero yields once instead.
    browse_latency_ms: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockAddressSpace {
    fn new(children: HashMap<NodeId, Vec<BrowseNode>>) -> Self {
        Self {
            children,
            state: Mutex::new(TransportState::Disconnected),
            calls: Mutex::new(Vec::new()),
            failing_browses: Mutex::new(HashSet::new()),
            connect_failures: AtomicU32::new(0),
            fail_session: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            browse_latency_ms: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Starts the mock in the `SessionOpen` state, for walker-only tests.
    pub fn with_open_session(self) -> Self {
        *self.state.lock() = TransportState::SessionOpen;
        self
    }

    // -------------------------------------------------------------------------
    // Failure injection
    // -------------------------------------------------------------------------

    /// Makes browse requests for `node` fail.
    pub fn fail_browse(&self, node: &NodeId) {
        self.failing_browses.lock().insert(node.clone());
    }

    /// Makes the next `count` connect attempts fail with a retryable error.
    pub fn fail_connects(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Makes session creation fail.
    pub fn fail_session(&self, fail: bool) {
        self.fail_session.store(fail, Ordering::SeqCst);
    }

    /// Makes session close fail.
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Makes disconnect fail.
    pub fn fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Sets the simulated latency of every browse.
    pub fn set_browse_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.browse_latency_ms.store(millis, Ordering::SeqCst);
    }

    // -------------------------------------------------------------------------
    // Verification
    // -------------------------------------------------------------------------

    /// Returns every recorded call in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Returns the recorded calls other than browse.
    pub fn lifecycle_calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| !call.is_browse())
            .cloned()
            .collect()
    }

    /// Returns the number of browse requests issued.
    pub fn browse_count(&self) -> usize {
        self.calls.lock().iter().filter(|call| call.is_browse()).count()
    }

    /// Returns the number of connect attempts.
    pub fn connect_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| **call == MockCall::Connect)
            .count()
    }

    /// Returns the highest number of concurrent browse requests observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Clears recorded calls and the in-flight peak.
    pub fn reset(&self) {
        self.calls.lock().clear();
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock() = state;
    }
}

#[async_trait]
impl OpcUaTransport for MockAddressSpace {
    async fn connect(&self) -> OpcUaResult<()> {
        self.record(MockCall::Connect);

        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(OpcUaError::connection(ConnectionError::refused(MOCK_ENDPOINT)));
        }

        self.set_state(TransportState::Connected);
        Ok(())
    }

    async fn create_session(&self) -> OpcUaResult<()> {
        self.record(MockCall::CreateSession);

        if self.fail_session.load(Ordering::SeqCst) {
            return Err(OpcUaError::session(SessionError::creation_failed(
                "BadIdentityTokenRejected",
            )));
        }

        self.set_state(TransportState::SessionOpen);
        Ok(())
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseNode>> {
        self.record(MockCall::Browse(node_id.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = self.browse_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_browses.lock().contains(node_id) {
            return Err(OpcUaError::browse(BrowseError::bad_status(
                node_id.to_string(),
                BAD_NODE_ID_UNKNOWN,
            )));
        }
        Ok(self.children.get(node_id).cloned().unwrap_or_default())
    }

    async fn close_session(&self) -> OpcUaResult<()> {
        self.record(MockCall::CloseSession);
        self.set_state(TransportState::Connected);

        if self.fail_close.load(Ordering::SeqCst) {
            return Err(OpcUaError::session(SessionError::close_failed(
                "BadSessionIdInvalid",
            )));
        }
        Ok(())
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.record(MockCall::Disconnect);
        self.set_state(TransportState::Disconnected);

        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(OpcUaError::connection(ConnectionError::refused(MOCK_ENDPOINT)));
        }
        Ok(())
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }

    fn endpoint(&self) -> &str {
        MOCK_ENDPOINT
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_tree() {
        let mut builder = AddressSpaceBuilder::new();
        let devices = builder.object(&NodeId::OBJECTS_FOLDER, "Devices");
        builder.variable(&devices, "Sensor1");
        let space = builder.build();

        let root = space.browse(&NodeId::OBJECTS_FOLDER).await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name(), "Devices");

        let leaves = space.browse(&devices).await.unwrap();
        assert_eq!(leaves[0].node_id, NodeId::string(2, "Devices.Sensor1"));
        assert_eq!(space.browse_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_failures_are_consumed() {
        let space = AddressSpaceBuilder::new().build();
        space.fail_connects(1);

        let err = space.connect().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(space.connect().await.is_ok());
        assert_eq!(space.state(), TransportState::Connected);
        assert_eq!(space.connect_count(), 2);
    }
}
