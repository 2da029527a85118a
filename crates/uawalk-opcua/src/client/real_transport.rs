// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport backed by the `opcua` crate.
//!
//! The `opcua` client API is blocking, so every server round trip runs on
//! `tokio::task::spawn_blocking`. One session is shared by all concurrent
//! browse requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use uawalk_opcua::client::RealOpcUaTransport;
//! use uawalk_opcua::types::ClientConfig;
//!
//! let transport = RealOpcUaTransport::new(ClientConfig::new("opc.tcp://localhost:4840"));
//! transport.connect().await?;
//! transport.create_session().await?;
//! let children = transport.browse(&NodeId::OBJECTS_FOLDER).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use opcua::client::prelude::{
    BrowseDescription, BrowseDescriptionResultMask, BrowseDirection, ByteString, Client,
    ClientBuilder, EndpointDescription, IdentityToken, ReferenceDescription, ReferenceTypeId,
    Session, SessionService, ViewService,
};
use opcua::sync::RwLock as OpcUaRwLock;

use crate::client::transport::{OpcUaTransport, TransportState};
use crate::error::{BrowseError, ConnectionError, OpcUaError, OpcUaResult, SessionError};
use crate::types::{
    BrowseNode, ClientConfig, NodeClass, NodeId, NodeIdentifier, QualifiedName, SecurityMode,
    SecurityPolicy, UserTokenType,
};

type SharedSession = Arc<OpcUaRwLock<Session>>;

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// Transport talking to a real OPC UA server.
pub struct RealOpcUaTransport {
    config: ClientConfig,
    state: RwLock<TransportState>,
    client: Mutex<Option<Client>>,
    session: RwLock<Option<SharedSession>>,
}

impl RealOpcUaTransport {
    /// Creates a transport for the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: RwLock::new(TransportState::Disconnected),
            client: Mutex::new(None),
            session: RwLock::new(None),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn set_state(&self, next: TransportState) {
        let mut state = self.state.write();
        if *state != next {
            trace!(from = %*state, to = %next, "Transport state change");
            *state = next;
        }
    }

    fn build_client(config: &ClientConfig) -> OpcUaResult<Client> {
        let mut builder = ClientBuilder::new()
            .application_name(config.application_name.as_str())
            .application_uri(config.application_uri().as_str())
            .session_retry_limit(0)
            .session_timeout(u32::try_from(config.session_timeout.as_millis()).unwrap_or(u32::MAX))
            .trust_server_certs(config.trust_server_certs);

        if let Some(pki_dir) = &config.pki_dir {
            builder = builder.pki_dir(pki_dir.as_str());
        }

        builder.client().ok_or_else(|| {
            OpcUaError::connection(ConnectionError::invalid_endpoint(
                &config.endpoint,
                "Failed to build OPC UA client",
            ))
        })
    }

    fn security_policy(config: &ClientConfig) -> opcua::client::prelude::SecurityPolicy {
        use opcua::client::prelude::SecurityPolicy as UaPolicy;
        match config.security_policy {
            SecurityPolicy::None => UaPolicy::None,
            SecurityPolicy::Basic256Sha256 => UaPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep => UaPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss => UaPolicy::Aes256Sha256RsaPss,
        }
    }

    fn message_security_mode(config: &ClientConfig) -> opcua::types::MessageSecurityMode {
        match config.security_mode {
            SecurityMode::None => opcua::types::MessageSecurityMode::None,
            SecurityMode::Sign => opcua::types::MessageSecurityMode::Sign,
            SecurityMode::SignAndEncrypt => opcua::types::MessageSecurityMode::SignAndEncrypt,
        }
    }

    fn identity_token(config: &ClientConfig) -> IdentityToken {
        match &config.user_token {
            UserTokenType::Anonymous => IdentityToken::Anonymous,
            UserTokenType::UserName { username, password } => {
                IdentityToken::UserName(username.clone(), password.clone())
            }
        }
    }

    /// Discovers endpoints and picks the one matching the configured security.
    fn select_endpoint(client: &Client, config: &ClientConfig) -> OpcUaResult<EndpointDescription> {
        let endpoints = client
            .get_server_endpoints_from_url(config.endpoint.as_str())
            .map_err(|status| {
                debug!(endpoint = %config.endpoint, status = %status, "Endpoint discovery failed");
                OpcUaError::connection(ConnectionError::endpoint_not_found(&config.endpoint))
            })?;

        let policy = Self::security_policy(config);
        let mode = Self::message_security_mode(config);

        endpoints
            .iter()
            .find(|e| e.security_policy_uri.as_ref() == policy.to_uri() && e.security_mode == mode)
            .cloned()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::no_suitable_endpoint(format!(
                    "{}/{}",
                    config.security_policy, config.security_mode
                )))
            })
    }

    fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
        let ns = node_id.namespace_index;
        match &node_id.identifier {
            NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(ns, *v),
            NodeIdentifier::String(v) => opcua::types::NodeId::new(ns, v.clone()),
            NodeIdentifier::Guid(v) => opcua::types::NodeId::new(ns, opcua::types::Guid::from(*v)),
            NodeIdentifier::Opaque(v) => {
                opcua::types::NodeId::new(ns, opcua::types::ByteString::from(v.as_slice()))
            }
        }
    }

    fn from_opcua_node_id(node_id: &opcua::types::NodeId) -> NodeId {
        let ns = node_id.namespace;
        match &node_id.identifier {
            opcua::types::Identifier::Numeric(v) => NodeId::numeric(ns, *v),
            opcua::types::Identifier::String(v) => {
                let value: &str = v.as_ref();
                NodeId::string(ns, value)
            }
            opcua::types::Identifier::Guid(v) => {
                NodeId::guid(ns, uuid::Uuid::from_bytes(*v.as_bytes()))
            }
            opcua::types::Identifier::ByteString(v) => {
                NodeId::opaque(ns, v.value.clone().unwrap_or_default())
            }
        }
    }

    fn to_browse_node(reference: &ReferenceDescription) -> BrowseNode {
        let name: &str = reference.browse_name.name.as_ref();
        let display_name: &str = reference.display_name.text.as_ref();
        BrowseNode {
            node_id: Self::from_opcua_node_id(&reference.node_id.node_id),
            node_class: NodeClass::from_value(reference.node_class as u32),
            browse_name: QualifiedName::new(reference.browse_name.namespace_index, name),
            display_name: display_name.to_string(),
        }
    }

    fn current_session(&self) -> OpcUaResult<SharedSession> {
        self.session
            .read()
            .clone()
            .ok_or_else(|| OpcUaError::session(SessionError::NotOpen))
    }

    /// Runs one browse plus every follow-up `BrowseNext` on the blocking pool.
    fn browse_blocking(session: &SharedSession, node_id: &NodeId) -> OpcUaResult<Vec<BrowseNode>> {
        let node_label = node_id.to_string();
        let description = BrowseDescription {
            node_id: Self::to_opcua_node_id(node_id),
            browse_direction: BrowseDirection::Forward,
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: BrowseDescriptionResultMask::all().bits(),
        };

        let session = session.read();
        let mut results = session
            .browse(&[description])
            .map_err(|status| OpcUaError::browse_failed(&node_label, status.to_string()))?
            .unwrap_or_default();

        let mut nodes = Vec::new();
        loop {
            let Some(result) = results.pop() else {
                return Err(OpcUaError::browse_failed(&node_label, "No browse results returned"));
            };

            if result.status_code.is_bad() {
                return Err(OpcUaError::browse(BrowseError::bad_status(
                    &node_label,
                    result.status_code.bits(),
                )));
            }

            if let Some(references) = &result.references {
                nodes.extend(references.iter().map(Self::to_browse_node));
            }

            let continuation: ByteString = result.continuation_point;
            if continuation.value.as_ref().map_or(true, |bytes| bytes.is_empty()) {
                return Ok(nodes);
            }

            trace!(node_id = %node_label, collected = nodes.len(), "Following continuation point");
            results = session
                .browse_next(false, &[continuation])
                .map_err(|status| OpcUaError::browse_failed(&node_label, status.to_string()))?
                .unwrap_or_default();
        }
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn connect(&self) -> OpcUaResult<()> {
        self.set_state(TransportState::Connecting);
        debug!(endpoint = %self.config.endpoint, "Connecting to OPC UA server");

        let config = self.config.clone();
        let connected = tokio::task::spawn_blocking(move || -> OpcUaResult<(Client, SharedSession)> {
            let mut client = Self::build_client(&config)?;
            let endpoint = Self::select_endpoint(&client, &config)?;
            debug!(
                security_policy = %endpoint.security_policy_uri,
                security_mode = ?endpoint.security_mode,
                "Found matching endpoint"
            );

            let session = client
                .new_session_from_info((endpoint, Self::identity_token(&config)))
                .map_err(|status| {
                    debug!(status = %status, "Session object creation failed");
                    OpcUaError::connection(ConnectionError::refused(&config.endpoint))
                })?;

            session.write().connect().map_err(|status| {
                debug!(status = %status, "Secure channel open failed");
                OpcUaError::connection(ConnectionError::refused(&config.endpoint))
            })?;

            Ok((client, session))
        })
        .await
        .map_err(|e| {
            OpcUaError::connection(ConnectionError::refused_with(
                &self.config.endpoint,
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            ))
        })?;

        match connected {
            Ok((client, session)) => {
                *self.client.lock() = Some(client);
                *self.session.write() = Some(session);
                self.set_state(TransportState::Connected);
                Ok(())
            }
            Err(error) => {
                self.set_state(TransportState::Disconnected);
                Err(error)
            }
        }
    }

    async fn create_session(&self) -> OpcUaResult<()> {
        let session = self.current_session()?;

        let created = tokio::task::spawn_blocking(move || -> OpcUaResult<()> {
            let session = session.write();
            session.create_session().map_err(|status| {
                OpcUaError::session(SessionError::creation_failed(status.to_string()))
            })?;
            session.activate_session().map_err(|status| {
                OpcUaError::session(SessionError::activation_failed(status.to_string()))
            })
        })
        .await
        .map_err(|e| OpcUaError::session(SessionError::creation_failed(e.to_string())))?;

        match created {
            Ok(()) => {
                info!(
                    endpoint = %self.config.endpoint,
                    identity = %self.config.user_token,
                    "OPC UA session activated"
                );
                self.set_state(TransportState::SessionOpen);
                Ok(())
            }
            Err(error) => {
                self.set_state(TransportState::Failed);
                Err(error)
            }
        }
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<BrowseNode>> {
        let session = self.current_session()?;
        let target = node_id.clone();

        tokio::task::spawn_blocking(move || Self::browse_blocking(&session, &target))
            .await
            .map_err(|e| OpcUaError::browse_failed(node_id.to_string(), e.to_string()))?
    }

    async fn close_session(&self) -> OpcUaResult<()> {
        let session = self.current_session()?;
        self.set_state(TransportState::Closing);

        let closed = tokio::task::spawn_blocking(move || {
            let session = session.read();
            if !session.is_connected() {
                return Err(OpcUaError::session(SessionError::close_failed(
                    "secure channel already closed",
                )));
            }
            session.disconnect();
            Ok(())
        })
        .await
        .map_err(|e| OpcUaError::session(SessionError::close_failed(e.to_string())))?;

        self.set_state(TransportState::Connected);
        closed
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        let session = self.session.write().take();
        self.client.lock().take();

        if let Some(session) = session {
            tokio::task::spawn_blocking(move || {
                let session = session.read();
                if session.is_connected() {
                    session.disconnect();
                }
            })
            .await
            .map_err(|e| {
                OpcUaError::connection(ConnectionError::refused_with(
                    &self.config.endpoint,
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                ))
            })?;
        }

        self.set_state(TransportState::Disconnected);
        debug!(endpoint = %self.config.endpoint, "Disconnected from OPC UA server");
        Ok(())
    }

    fn state(&self) -> TransportState {
        *self.state.read()
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_conversion_roundtrip() {
        let ids = [
            NodeId::OBJECTS_FOLDER,
            NodeId::string(2, "Line1.Press"),
            NodeId::guid(1, uuid::Uuid::nil()),
            NodeId::opaque(3, vec![0xde, 0xad]),
        ];
        for id in ids {
            let ua = RealOpcUaTransport::to_opcua_node_id(&id);
            assert_eq!(RealOpcUaTransport::from_opcua_node_id(&ua), id);
        }
    }

    #[test]
    fn test_new_transport_is_disconnected() {
        let transport = RealOpcUaTransport::new(ClientConfig::new("opc.tcp://localhost:4840"));
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert_eq!(transport.endpoint(), "opc.tcp://localhost:4840");
        assert!(transport.current_session().is_err());
    }

    #[test]
    fn test_identity_token_selection() {
        let anonymous = ClientConfig::new("opc.tcp://x:4840");
        assert!(matches!(
            RealOpcUaTransport::identity_token(&anonymous),
            IdentityToken::Anonymous
        ));

        let mut named = anonymous.clone();
        named.user_token = UserTokenType::from_credentials(Some("op"), Some("pw"));
        assert!(matches!(
            RealOpcUaTransport::identity_token(&named),
            IdentityToken::UserName(ref u, ref p) if u == "op" && p == "pw"
        ));
    }
}
