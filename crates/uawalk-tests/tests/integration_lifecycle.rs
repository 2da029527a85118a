// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Lifecycle Integration Tests
//!
//! Full crawls through [`CrawlRuntime`]: connect, session, walk, write and
//! teardown, with failures injected at every stage.
//!
//! ## Test Categories
//!
//! - `test_crawl_*`: Successful crawls and the written file
//! - `test_connect_*`: Backoff behavior
//! - `test_exit_*`: Stage failures, exit codes and exit policies

use std::sync::Arc;

use parking_lot::Mutex;

use uawalk_bin::{BinError, CrawlRuntime, Stage};
use uawalk_config::{BrowseErrorPolicy, ExitPolicy};
use uawalk_opcua::{BackoffNotice, NodeId};
use uawalk_tests::prelude::*;

fn runtime_for(
    space: &Arc<MockAddressSpace>,
    config: &uawalk_config::CrawlerConfig,
) -> CrawlRuntime<MockAddressSpace> {
    CrawlRuntime::new(Arc::clone(space), SettingsFixtures::settings_from(config))
}

// =============================================================================
// Successful Crawls
// =============================================================================

#[tokio::test]
async fn test_crawl_writes_csv() {
    init_test_logging();
    let dir = temp_test_dir("uawalk-crawl");
    let space = Arc::new(AddressSpaceFixtures::devices_and_config().build());

    let summary = runtime_for(&space, &SettingsFixtures::config(dir.path()))
        .run()
        .await
        .unwrap();

    let output = dir.path().join("nodes.csv");
    assert_eq!(summary.output, output);
    assert_eq!(summary.records, 2);
    assert!(summary.is_complete());
    assert!(summary.clean_shutdown);
    assert_eq!(summary.endpoint, MOCK_ENDPOINT);

    assert_eq!(
        read_csv_rows(&output),
        vec![
            ("/Config".to_string(), "Config".to_string()),
            ("/Devices/Sensor1".to_string(), "Sensor1".to_string()),
        ]
    );

    assert_eq!(
        space.lifecycle_calls(),
        vec![
            MockCall::Connect,
            MockCall::CreateSession,
            MockCall::CloseSession,
            MockCall::Disconnect,
        ]
    );
}

#[tokio::test]
async fn test_crawl_empty_address_space_writes_header_only() {
    let dir = temp_test_dir("uawalk-empty");
    let space = Arc::new(AddressSpaceBuilder::new().build());

    let summary = runtime_for(&space, &SettingsFixtures::config(dir.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.records, 0);
    assert_eq!(
        std::fs::read_to_string(&summary.output).unwrap(),
        "PATH,NAME\n"
    );
}

#[tokio::test]
async fn test_crawl_browses_happen_inside_session() {
    let dir = temp_test_dir("uawalk-order");
    let space = Arc::new(AddressSpaceFixtures::plant(4, 2).build());

    runtime_for(&space, &SettingsFixtures::config(dir.path()))
        .run()
        .await
        .unwrap();

    let calls = space.calls();
    let session = calls
        .iter()
        .position(|c| *c == MockCall::CreateSession)
        .unwrap();
    let close = calls
        .iter()
        .position(|c| *c == MockCall::CloseSession)
        .unwrap();
    let browses: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_browse())
        .map(|(i, _)| i)
        .collect();

    assert_eq!(browses.len(), 6);
    assert!(browses.iter().all(|&i| i > session && i < close));
}

#[tokio::test]
async fn test_crawl_close_failure_still_disconnects() {
    let dir = temp_test_dir("uawalk-close");
    let space = Arc::new(AddressSpaceFixtures::devices_and_config().build());
    space.fail_close(true);

    let summary = runtime_for(&space, &SettingsFixtures::config(dir.path()))
        .run()
        .await
        .unwrap();

    assert!(!summary.clean_shutdown);
    assert!(summary.output.exists());
    assert_eq!(
        space.lifecycle_calls()[2..],
        [MockCall::CloseSession, MockCall::Disconnect]
    );
}

#[tokio::test]
async fn test_crawl_partial_results_are_written() {
    let dir = temp_test_dir("uawalk-partial");
    let mut builder = AddressSpaceFixtures::devices_and_config();
    let broken = builder.object(&NodeId::OBJECTS_FOLDER, "Broken");
    builder.variable(&broken, "Hidden");
    let space = Arc::new(builder.build());
    space.fail_browse(&broken);

    let mut config = SettingsFixtures::config(dir.path());
    config.walk.on_browse_error = BrowseErrorPolicy::Partial;

    let summary = runtime_for(&space, &config).run().await.unwrap();

    assert!(!summary.is_complete());
    assert_eq!(summary.failures[0].path, "/Broken");
    assert_eq!(read_csv_rows(&summary.output).len(), 2);
}

// =============================================================================
// Connect Backoff
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_retries_with_backoff() {
    let dir = temp_test_dir("uawalk-backoff");
    let space = Arc::new(AddressSpaceFixtures::devices_and_config().build());
    space.fail_connects(2);

    let notices: Arc<Mutex<Vec<BackoffNotice>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notices);

    let summary = runtime_for(&space, &SettingsFixtures::config(dir.path()))
        .with_backoff_callback(move |notice| sink.lock().push(notice.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.connect_retries, 2);
    assert_eq!(space.connect_count(), 3);

    let notices = notices.lock();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].retry, 1);
    assert_eq!(notices[0].delay.as_millis(), 100);
    assert_eq!(notices[1].retry, 2);
    assert_eq!(notices[1].delay.as_millis(), 200);
    assert!(notices[0].to_string().contains("retry = 1"));
}

#[tokio::test(start_paused = true)]
async fn test_connect_gives_up_after_retry_budget() {
    let dir = temp_test_dir("uawalk-giveup");
    let space = Arc::new(AddressSpaceFixtures::devices_and_config().build());
    space.fail_connects(100);

    let err = runtime_for(&space, &SettingsFixtures::config(dir.path()))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Connecting));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(space.connect_count(), 4);
    assert!(!dir.path().join("nodes.csv").exists());
}

// =============================================================================
// Stage Failures and Exit Policies
// =============================================================================

#[tokio::test]
async fn test_exit_session_failure() {
    let dir = temp_test_dir("uawalk-session");
    let space = Arc::new(AddressSpaceFixtures::devices_and_config().build());
    space.fail_session(true);

    let err = runtime_for(&space, &SettingsFixtures::config(dir.path()))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Session));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(space.browse_count(), 0);
}

#[tokio::test]
async fn test_exit_browse_failure_fail_fast() {
    let dir = temp_test_dir("uawalk-failfast");
    let mut builder = AddressSpaceFixtures::devices_and_config();
    let broken = builder.object(&NodeId::OBJECTS_FOLDER, "Broken");
    let space = Arc::new(builder.build());
    space.fail_browse(&broken);

    let err = runtime_for(&space, &SettingsFixtures::config(dir.path()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, BinError::OpcUa { stage: Stage::Walking, .. }));
    assert_eq!(err.exit_code(), 4);
    assert!(!dir.path().join("nodes.csv").exists());
    assert_eq!(
        space.lifecycle_calls(),
        vec![MockCall::Connect, MockCall::CreateSession]
    );
}

#[tokio::test]
async fn test_exit_browse_failure_best_effort_tears_down() {
    let dir = temp_test_dir("uawalk-besteffort");
    let mut builder = AddressSpaceFixtures::devices_and_config();
    let broken = builder.object(&NodeId::OBJECTS_FOLDER, "Broken");
    let space = Arc::new(builder.build());
    space.fail_browse(&broken);

    let mut config = SettingsFixtures::config(dir.path());
    config.runtime.exit_policy = ExitPolicy::BestEffort;

    let err = runtime_for(&space, &config).run().await.unwrap_err();

    assert_eq!(err.exit_code(), 4);
    assert!(!dir.path().join("nodes.csv").exists());
    assert_eq!(
        space.lifecycle_calls(),
        vec![
            MockCall::Connect,
            MockCall::CreateSession,
            MockCall::CloseSession,
            MockCall::Disconnect,
        ]
    );
}

#[tokio::test]
async fn test_exit_session_failure_best_effort_disconnects() {
    let dir = temp_test_dir("uawalk-session-be");
    let space = Arc::new(AddressSpaceFixtures::devices_and_config().build());
    space.fail_session(true);

    let mut config = SettingsFixtures::config(dir.path());
    config.runtime.exit_policy = ExitPolicy::BestEffort;

    let err = runtime_for(&space, &config).run().await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(
        space.lifecycle_calls(),
        vec![MockCall::Connect, MockCall::CreateSession, MockCall::Disconnect]
    );
}

#[tokio::test]
async fn test_exit_missing_output_directory() {
    let dir = temp_test_dir("uawalk-io");
    let space = Arc::new(AddressSpaceFixtures::devices_and_config().build());

    let config = SettingsFixtures::config(&dir.path().join("missing"));
    let err = runtime_for(&space, &config).run().await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Writing));
    assert_eq!(err.exit_code(), 5);
    assert_eq!(space.browse_count(), 2);
}
