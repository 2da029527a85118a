// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built address spaces and crawl settings.

use std::path::Path;
use std::time::Duration;

use uawalk_bin::CrawlSettings;
use uawalk_config::CrawlerConfig;
use uawalk_opcua::{BrowseNode, NodeClass, NodeId};

use super::mocks::AddressSpaceBuilder;

// =============================================================================
// Address Space Fixtures
// =============================================================================

/// Fixture providing standard address spaces.
pub struct AddressSpaceFixtures;

impl AddressSpaceFixtures {
    /// `Devices/Sensor1` and `Config` below the Objects folder.
    pub fn devices_and_config() -> AddressSpaceBuilder {
        let mut builder = AddressSpaceBuilder::new();
        let devices = builder.object(&NodeId::OBJECTS_FOLDER, "Devices");
        builder.variable(&devices, "Sensor1");
        builder.variable(&NodeId::OBJECTS_FOLDER, "Config");
        builder
    }

    /// `lines` production lines, each with `sensors` variables and a `Reset` method.
    ///
    /// Produces `lines * (sensors + 1)` records and `lines + 1` browse requests.
    pub fn plant(lines: usize, sensors: usize) -> AddressSpaceBuilder {
        let mut builder = AddressSpaceBuilder::new();
        let plant = builder.object(&NodeId::OBJECTS_FOLDER, "Plant");
        for line in 0..lines {
            let line_id = builder.object(&plant, &format!("Line{:02}", line));
            for sensor in 0..sensors {
                builder.variable(&line_id, &format!("Sensor{:02}", sensor));
            }
            builder.reference(
                &line_id,
                BrowseNode::new(
                    NodeId::string(2, format!("Line{:02}.Reset", line)),
                    NodeClass::Method,
                    "Reset",
                ),
            );
        }
        builder
    }

    /// A chain of `depth` nested Objects named `L1..Ln`, with a `Value` leaf at the bottom.
    pub fn chain(depth: usize) -> AddressSpaceBuilder {
        let mut builder = AddressSpaceBuilder::new();
        let mut parent = NodeId::OBJECTS_FOLDER;
        for level in 1..=depth {
            parent = builder.object(&parent, &format!("L{}", level));
        }
        builder.variable(&parent, "Value");
        builder
    }

    /// The same node reachable through two parents.
    pub fn shared_leaf() -> AddressSpaceBuilder {
        let mut builder = AddressSpaceBuilder::new();
        let shared = BrowseNode::variable(NodeId::string(2, "Shared"), "Shared");
        let a = builder.object(&NodeId::OBJECTS_FOLDER, "A");
        let b = builder.object(&NodeId::OBJECTS_FOLDER, "B");
        builder.reference(&a, shared.clone());
        builder.reference(&b, shared);
        builder
    }
}

// =============================================================================
// Settings Fixtures
// =============================================================================

/// Fixture providing crawl configurations.
pub struct SettingsFixtures;

impl SettingsFixtures {
    /// Default configuration writing `nodes.csv` into `dir`, with short retry delays.
    pub fn config(dir: &Path) -> CrawlerConfig {
        let mut config = CrawlerConfig::default();
        config.output.directory = dir.to_path_buf();
        config.connection.retry.max_retries = 3;
        config.connection.retry.initial_delay = Duration::from_millis(100);
        config.connection.retry.max_delay = Duration::from_secs(1);
        config.connection.retry.jitter = 0.0;
        config
    }

    /// Resolved settings for [`SettingsFixtures::config`].
    pub fn settings(dir: &Path) -> CrawlSettings {
        Self::settings_from(&Self::config(dir))
    }

    /// Resolves settings from a configuration.
    pub fn settings_from(config: &CrawlerConfig) -> CrawlSettings {
        CrawlSettings::from_config(config).expect("fixture configuration must be valid")
    }
}
