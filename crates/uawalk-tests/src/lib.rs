// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uawalk Integration Tests
//!
//! Integration tests and test utilities for the uawalk crawler. Every test
//! runs against an in-memory address space, so no OPC UA server is needed.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `mocks`: In-memory [`OpcUaTransport`](uawalk_opcua::OpcUaTransport)
//!   - `fixtures`: Pre-built address spaces and crawl settings
//!   - `assertions`: CSV and call-order assertion helpers
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p uawalk-tests
//!
//! # Run specific test suite
//! cargo test -p uawalk-tests --test integration_walk
//! cargo test -p uawalk-tests --test integration_lifecycle
//! cargo test -p uawalk-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Walk Tests (`integration_walk.rs`)
//! - Completeness and path construction
//! - Concurrency limit
//! - Abort and partial failure handling
//!
//! ### Lifecycle Tests (`integration_lifecycle.rs`)
//! - End-to-end crawl to CSV
//! - Connect backoff
//! - Exit policies and teardown order
//!
//! ### Config Tests (`integration_config.rs`)
//! - File formats and environment overrides
//! - CLI flag precedence
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use uawalk_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let space = AddressSpaceFixtures::devices_and_config().build();
//!     // ... test logic
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}
