// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uawalk - OPC UA address-space inventory crawler
//!
//! Main binary entry point.

use tracing::debug;

use uawalk_bin::logging::with_bootstrap_logging;
use uawalk_bin::{crawl, init_logging, report_error_and_exit, BinError, Cli, CrawlSettings};

fn main() {
    let cli = Cli::parse_args();

    let config = match with_bootstrap_logging(|| cli.load_config()) {
        Ok(config) => config,
        Err(e) => report_error_and_exit(e),
    };

    if let Err(e) = init_logging(&config.logging) {
        report_error_and_exit(e);
    }
    debug!(version = uawalk_bin::VERSION, config = %cli.config.display(), "Starting uawalk");

    let settings = match CrawlSettings::from_config(&config) {
        Ok(settings) => settings,
        Err(e) => report_error_and_exit(e),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("uawalk-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => report_error_and_exit(BinError::runtime(format!(
            "Failed to start async runtime: {}",
            e
        ))),
    };

    match runtime.block_on(crawl(settings)) {
        Ok(summary) => {
            debug!(
                output = %summary.output.display(),
                clean_shutdown = summary.clean_shutdown,
                "Exiting"
            );
        }
        Err(e) => report_error_and_exit(e),
    }
}
