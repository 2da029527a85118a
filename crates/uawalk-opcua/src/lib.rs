// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA address-space walking for uawalk.
//!
//! This crate connects to an OPC UA server, browses its address space from a
//! start node and flattens every non-Object reference into a [`PathRecord`].
//!
//! # Features
//!
//! - Transport abstraction with an `opcua`-backed implementation
//!   (`real-transport` feature)
//! - Connect with exponential backoff and backoff notifications
//! - Concurrent recursive walk bounded by a semaphore
//! - Abort or partial handling of failed browse requests
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint discovery and connect failures
//! ├── Session       - Session create/activate/close failures
//! ├── Browse        - Browse request failures
//! └── Configuration - Invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uawalk_opcua::{AddressSpaceWalker, ConnectionManager, NodeId, RealOpcUaTransport, WalkOptions};
//!
//! let transport = Arc::new(RealOpcUaTransport::new(config));
//! let manager = ConnectionManager::new(transport.clone(), config.retry.clone());
//! manager.connect().await?;
//! manager.create_session().await?;
//!
//! let outcome = AddressSpaceWalker::new(transport, WalkOptions::default())
//!     .walk(&NodeId::OBJECTS_FOLDER)
//!     .await?;
//! manager.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod types;
pub mod walker;

pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ErrorCode, OpcUaError,
    OpcUaResult, SessionError,
};

pub use types::{
    BrowseNode, ClientConfig, ClientConfigBuilder, NodeClass, NodeId, NodeIdentifier, PathRecord,
    QualifiedName, SecurityMode, SecurityPolicy, UserTokenType,
};

pub use client::{
    BackoffNotice, ConnectionManager, ExponentialBackoff, OpcUaTransport, RetryConfig, Teardown,
    TransportState,
};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaTransport;

pub use walker::{
    AddressSpaceWalker, BrowseFailureMode, WalkFailure, WalkOptions, WalkOutcome, WalkStatistics,
};
