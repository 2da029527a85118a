// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client plumbing.
//!
//! - **Transport Layer**: [`OpcUaTransport`] trait and its `opcua`-backed implementation
//! - **Retry**: exponential backoff for the initial connect
//! - **Connection Manager**: connect, session creation and teardown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ConnectionManager                           │
//! │        (connect with backoff, create/close session)             │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OpcUaTransport                             │
//! │         (RealOpcUaTransport, or a mock in tests)                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod connection;
pub mod retry;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use connection::{BackoffCallback, BackoffNotice, ConnectionManager, ConnectionStats, Teardown};
pub use retry::{ExponentialBackoff, RetryConfig};
pub use transport::{OpcUaTransport, TransportState};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
