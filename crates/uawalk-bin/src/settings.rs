// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Translation of the loaded configuration into client, walk and sink settings.

use uawalk_config::{
    BrowseErrorPolicy, CrawlerConfig, ExitPolicy, RetrySettings, SecurityMode as ModeSetting,
    SecurityPolicy as PolicySetting,
};
use uawalk_opcua::{
    BrowseFailureMode, ClientConfig, NodeId, RetryConfig, SecurityMode, SecurityPolicy,
    UserTokenType, WalkOptions,
};

use crate::error::{BinError, BinResult};
use crate::sink::CsvSink;

/// Everything one crawl needs, resolved from [`CrawlerConfig`].
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Client configuration for the transport.
    pub client: ClientConfig,
    /// Node the walk starts from.
    pub start_node: NodeId,
    /// Walk options.
    pub walk: WalkOptions,
    /// Result sink.
    pub sink: CsvSink,
    /// Teardown behavior after a fatal error.
    pub exit_policy: ExitPolicy,
}

impl CrawlSettings {
    /// Resolves settings from a validated configuration.
    pub fn from_config(config: &CrawlerConfig) -> BinResult<Self> {
        let start_node: NodeId = config.walk.start_node.parse().map_err(|e| {
            BinError::invalid_setting("walk.start_node", format!("{}", e))
        })?;

        Ok(Self {
            client: client_config(config)?,
            start_node,
            walk: walk_options(config),
            sink: CsvSink::new(&config.output.directory, &config.output.file_name),
            exit_policy: config.runtime.exit_policy,
        })
    }
}

/// Builds the transport configuration.
pub fn client_config(config: &CrawlerConfig) -> BinResult<ClientConfig> {
    let connection = &config.connection;

    let user_token = UserTokenType::from_credentials(
        connection.effective_username(),
        connection.password.as_ref().map(|p| p.raw()),
    );

    let mut builder = ClientConfig::builder()
        .endpoint(&connection.endpoint)
        .security_mode(security_mode(connection.security_mode))
        .security_policy(security_policy(connection.security_policy))
        .user_token(user_token)
        .application_name(&connection.application_name)
        .session_timeout(connection.session_timeout)
        .trust_server_certs(connection.trust_server_certs)
        .retry(retry_config(&connection.retry));

    if let Some(dir) = &connection.pki_dir {
        builder = builder.pki_dir(dir.to_string_lossy());
    }

    builder
        .build()
        .map_err(|e| BinError::invalid_setting("connection", e.to_string()))
}

/// Builds the walk options.
pub fn walk_options(config: &CrawlerConfig) -> WalkOptions {
    let failure_mode = match config.walk.on_browse_error {
        BrowseErrorPolicy::Abort => BrowseFailureMode::Abort,
        BrowseErrorPolicy::Partial => BrowseFailureMode::Partial,
    };

    WalkOptions::new()
        .with_max_concurrency(config.walk.max_concurrency)
        .with_max_depth(config.walk.max_depth)
        .with_failure_mode(failure_mode)
}

fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig::exponential(settings.max_retries, settings.initial_delay, settings.max_delay)
        .with_multiplier(settings.multiplier)
        .with_jitter(settings.jitter)
}

fn security_mode(mode: ModeSetting) -> SecurityMode {
    match mode {
        ModeSetting::None => SecurityMode::None,
        ModeSetting::Sign => SecurityMode::Sign,
        ModeSetting::SignAndEncrypt => SecurityMode::SignAndEncrypt,
    }
}

fn security_policy(policy: PolicySetting) -> SecurityPolicy {
    match policy {
        PolicySetting::None => SecurityPolicy::None,
        PolicySetting::Basic256Sha256 => SecurityPolicy::Basic256Sha256,
        PolicySetting::Aes128Sha256RsaOaep => SecurityPolicy::Aes128Sha256RsaOaep,
        PolicySetting::Aes256Sha256RsaPss => SecurityPolicy::Aes256Sha256RsaPss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use uawalk_config::SecretValue;

    #[test]
    fn test_defaults() {
        let settings = CrawlSettings::from_config(&CrawlerConfig::default()).unwrap();

        assert_eq!(settings.client.endpoint, "opc.tcp://localhost:4840");
        assert!(settings.client.user_token.is_anonymous());
        assert_eq!(settings.start_node, NodeId::OBJECTS_FOLDER);
        assert_eq!(settings.walk, WalkOptions::default());
        assert_eq!(settings.sink.target_path(), PathBuf::from("./nodes.csv"));
        assert_eq!(settings.exit_policy, ExitPolicy::FailFast);
    }

    #[test]
    fn test_credentials_select_username_identity() {
        let mut config = CrawlerConfig::default();
        config.connection.username = Some("operator".to_string());
        config.connection.password = Some(SecretValue::new("secret"));

        let client = client_config(&config).unwrap();
        assert_eq!(
            client.user_token,
            UserTokenType::UserName {
                username: "operator".to_string(),
                password: "secret".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_username_is_anonymous() {
        let mut config = CrawlerConfig::default();
        config.connection.username = Some(String::new());
        config.connection.password = Some(SecretValue::new("ignored"));

        assert!(client_config(&config).unwrap().user_token.is_anonymous());
    }

    #[test]
    fn test_walk_and_retry_mapping() {
        let mut config = CrawlerConfig::default();
        config.walk.max_concurrency = 4;
        config.walk.max_depth = Some(3);
        config.walk.on_browse_error = BrowseErrorPolicy::Partial;
        config.connection.retry.max_retries = 1;
        config.connection.retry.initial_delay = Duration::from_millis(250);

        let walk = walk_options(&config);
        assert_eq!(walk.max_concurrency, 4);
        assert_eq!(walk.max_depth, Some(3));
        assert_eq!(walk.failure_mode, BrowseFailureMode::Partial);

        let client = client_config(&config).unwrap();
        assert_eq!(client.retry.max_retries, 1);
        assert_eq!(client.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(client.retry.jitter, 0.1);
    }

    #[test]
    fn test_invalid_start_node() {
        let mut config = CrawlerConfig::default();
        config.walk.start_node = "ns=x;i=1".to_string();

        let err = CrawlSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, BinError::InvalidSetting { ref field, .. } if field == "walk.start_node"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_security_mapping() {
        let mut config = CrawlerConfig::default();
        config.connection.security_mode = ModeSetting::SignAndEncrypt;
        config.connection.security_policy = PolicySetting::Aes256Sha256RsaPss;

        let client = client_config(&config).unwrap();
        assert_eq!(client.security_mode, SecurityMode::SignAndEncrypt);
        assert_eq!(client.security_policy, SecurityPolicy::Aes256Sha256RsaPss);
    }
}
