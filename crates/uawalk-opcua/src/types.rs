// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space data model.
//!
//! - **NodeId**: the four OPC UA identifier kinds with text parsing
//! - **NodeClass**: node classification deciding whether a node is expanded
//! - **BrowseNode**: one reference returned by a browse request
//! - **PathRecord**: one output row, a leaf reference and its browse path
//! - **ClientConfig**: endpoint, identity, security and retry settings
//!
//! # Examples
//!
//! ```
//! use uawalk_opcua::types::{NodeId, PathRecord};
//!
//! let root: NodeId = "ObjectsFolder".parse().unwrap();
//! assert_eq!(root, NodeId::OBJECTS_FOLDER);
//!
//! let record = PathRecord::child_of("/Devices", "Sensor1");
//! assert_eq!(record.path, "/Devices/Sensor1");
//! assert_eq!(record.name, "Sensor1");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::retry::RetryConfig;
use crate::error::{ConfigurationError, OpcUaError};

/// Separator between browse names in a record path.
pub const PATH_SEPARATOR: char = '/';

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA Node Identifier.
///
/// A namespace index plus a numeric, string, GUID, or opaque identifier.
///
/// # Examples
///
/// ```
/// use uawalk_opcua::types::NodeId;
///
/// let numeric = NodeId::numeric(2, 1001);
/// assert_eq!(numeric.to_string(), "ns=2;i=1001");
///
/// let parsed: NodeId = "ns=2;s=Line1.Press".parse().unwrap();
/// assert_eq!(parsed.as_string(), Some("Line1.Press"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// `i=84`, accepted as `RootFolder`.
    pub const ROOT_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(84),
    };

    /// Objects folder node (ns=0, i=85), the default walk start.
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(85),
    };

    /// The text of a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            NodeIdentifier::String(v) => Some(v),
            _ => None,
        }
    }

    /// Resolves the symbolic names accepted for well-known folders.
    fn well_known(name: &str) -> Option<Self> {
        match name {
            "ObjectsFolder" | "Objects" => Some(Self::OBJECTS_FOLDER),
            "RootFolder" | "Root" => Some(Self::ROOT_FOLDER),
            _ => None,
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::OBJECTS_FOLDER
    }
}

/// Namespace 0 is written without the `ns=` prefix.
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace_index {
            0 => fmt::Display::fmt(&self.identifier, f),
            ns => write!(f, "ns={};{}", ns, self.identifier),
        }
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001`, `ns=2;s=Name`, `ns=2;g=<uuid>`, `ns=2;b=<base64>`
    /// - `i=85` (namespace 0)
    /// - `ObjectsFolder`, `RootFolder`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| {
            OpcUaError::configuration(ConfigurationError::invalid_node_id(s, reason))
        };

        if let Some(node) = Self::well_known(s) {
            return Ok(node);
        }

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".to_string()))?;
                let ns: u16 = ns
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index".to_string()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(
                id.parse()
                    .map_err(|_| invalid("Invalid numeric identifier".to_string()))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(
                Uuid::parse_str(id).map_err(|e| invalid(format!("Invalid GUID: {}", e)))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(
                BASE64
                    .decode(id)
                    .map_err(|e| invalid(format!("Invalid base64: {}", e)))?,
            )
        } else {
            return Err(invalid(
                "Unknown identifier type. Expected i=, s=, g=, or b=".to_string(),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// OPC UA node identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node class.
///
/// Only [`NodeClass::Object`] nodes are expanded by the walker; every other
/// class, including values the server reports outside the standard table,
/// is recorded as a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// No class or a value outside the standard table.
    #[default]
    Unspecified,
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the OPC UA bit mask value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from the OPC UA value, mapping unknown values to `Unspecified`.
    pub fn from_value(value: u32) -> Self {
        match value {
            1 => Self::Object,
            2 => Self::Variable,
            4 => Self::Method,
            8 => Self::ObjectType,
            16 => Self::VariableType,
            32 => Self::ReferenceType,
            64 => Self::DataType,
            128 => Self::View,
            _ => Self::Unspecified,
        }
    }

    /// Returns `true` if the walker descends into nodes of this class.
    #[inline]
    pub const fn is_traversable(&self) -> bool {
        matches!(self, Self::Object)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
            Self::ObjectType => "ObjectType",
            Self::VariableType => "VariableType",
            Self::ReferenceType => "ReferenceType",
            Self::DataType => "DataType",
            Self::View => "View",
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// QualifiedName / BrowseNode
// =============================================================================

/// A browse name qualified by its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Namespace index of the name.
    pub namespace_index: u16,
    /// The name text used in record paths.
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.namespace_index, self.name)
        }
    }
}

/// One reference returned by a browse request.
///
/// Classified once by `node_class` when discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseNode {
    /// Target node of the reference.
    pub node_id: NodeId,
    /// Node class of the target.
    pub node_class: NodeClass,
    /// Browse name of the target.
    pub browse_name: QualifiedName,
    /// Display name of the target.
    pub display_name: String,
}

impl BrowseNode {
    /// Creates a browse node with the display name equal to the browse name.
    pub fn new(node_id: NodeId, node_class: NodeClass, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            browse_name: QualifiedName::new(node_id.namespace_index, name.clone()),
            display_name: name,
            node_id,
            node_class,
        }
    }

    /// Creates an `Object` browse node.
    pub fn object(node_id: NodeId, name: impl Into<String>) -> Self {
        Self::new(node_id, NodeClass::Object, name)
    }

    /// Creates a `Variable` browse node.
    pub fn variable(node_id: NodeId, name: impl Into<String>) -> Self {
        Self::new(node_id, NodeClass::Variable, name)
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Returns the name used in record paths.
    #[inline]
    pub fn name(&self) -> &str {
        &self.browse_name.name
    }
}

// =============================================================================
// PathRecord
// =============================================================================

/// One discovered leaf reference and the browse path leading to it.
///
/// The root prefix is the empty string, so direct children of the start
/// node have paths of the form `/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathRecord {
    /// Ancestor browse names and the leaf name joined by `/`.
    pub path: String,
    /// The leaf's own browse name.
    pub name: String,
}

impl PathRecord {
    /// Creates a record for `name` directly below `prefix`.
    pub fn child_of(prefix: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: join_path(prefix, &name),
            name,
        }
    }

    /// Returns the number of path segments.
    pub fn depth(&self) -> usize {
        self.path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()).count()
    }
}

impl fmt::Display for PathRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.name)
    }
}

/// Appends one browse name to a path prefix.
#[inline]
pub fn join_path(prefix: &str, name: &str) -> String {
    let mut path = String::with_capacity(prefix.len() + name.len() + 1);
    path.push_str(prefix);
    path.push(PATH_SEPARATOR);
    path.push_str(name);
    path
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No security.
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns `true` if this mode provides no security.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "sign" => Ok(Self::Sign),
            "signandencrypt" | "signencrypt" => Ok(Self::SignAndEncrypt),
            _ => Err(OpcUaError::configuration(
                ConfigurationError::invalid_security_mode(s),
            )),
        }
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security policy.
    #[default]
    None,

    /// Basic256Sha256.
    Basic256Sha256,

    /// Aes128Sha256RsaOaep.
    Aes128Sha256RsaOaep,

    /// Aes256Sha256RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.rsplit('#').next().unwrap_or(s);
        match key.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "basic256sha256" => Ok(Self::Basic256Sha256),
            "aes128sha256rsaoaep" => Ok(Self::Aes128Sha256RsaOaep),
            "aes256sha256rsapss" => Ok(Self::Aes256Sha256RsaPss),
            _ => Err(OpcUaError::configuration(
                ConfigurationError::invalid_security_policy(s),
            )),
        }
    }
}

// =============================================================================
// UserTokenType
// =============================================================================

/// Identity presented when activating the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserTokenType {
    /// Anonymous authentication.
    #[default]
    Anonymous,

    /// Username and password authentication.
    UserName {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },
}

impl UserTokenType {
    /// Picks the identity from optional credentials.
    ///
    /// An empty or missing username selects anonymous authentication.
    pub fn from_credentials(username: Option<&str>, password: Option<&str>) -> Self {
        match username {
            Some(user) if !user.is_empty() => Self::UserName {
                username: user.to_string(),
                password: password.unwrap_or_default().to_string(),
            },
            _ => Self::Anonymous,
        }
    }

    /// Returns `true` if this is anonymous authentication.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Display for UserTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { username, .. } => write!(f, "UserName({})", username),
        }
    }
}

// =============================================================================
// ClientConfig
// =============================================================================

/// Connection settings for one crawl.
///
/// # Examples
///
/// ```
/// use uawalk_opcua::types::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .endpoint("opc.tcp://localhost:4840")
///     .username("operator", "secret")
///     .build()
///     .unwrap();
/// assert!(!config.user_token.is_anonymous());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint URL (e.g., "opc.tcp://localhost:4840").
    pub endpoint: String,

    /// Security mode.
    #[serde(default)]
    pub security_mode: SecurityMode,

    /// Security policy.
    #[serde(default)]
    pub security_policy: SecurityPolicy,

    /// User authentication token.
    #[serde(default)]
    pub user_token: UserTokenType,

    /// Application name announced to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Session timeout.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// PKI directory for certificates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pki_dir: Option<String>,

    /// Whether to trust server certificates automatically.
    #[serde(default = "default_trust_server_certs")]
    pub trust_server_certs: bool,

    /// Connect retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_application_name() -> String {
    "uawalk".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_trust_server_certs() -> bool {
    true
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Creates a configuration with defaults for everything except the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Returns the application URI derived from the application name.
    pub fn application_uri(&self) -> String {
        format!("urn:uawalk:{}", self.application_name.replace(' ', ""))
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), OpcUaError> {
        if self.endpoint.is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                "endpoint",
            )));
        }

        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_endpoint(
                &self.endpoint,
                "Endpoint must start with opc.tcp://",
            )));
        }

        if self.security_mode.is_none() != (self.security_policy == SecurityPolicy::None) {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_security(
                format!(
                    "Security mode {} cannot be combined with policy {}",
                    self.security_mode, self.security_policy
                ),
            )));
        }

        if self.session_timeout.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_timeout(
                self.session_timeout,
                "Session timeout must be greater than 0",
            )));
        }

        self.retry.validate()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            security_mode: SecurityMode::default(),
            security_policy: SecurityPolicy::default(),
            user_token: UserTokenType::default(),
            application_name: default_application_name(),
            session_timeout: default_session_timeout(),
            pki_dir: None,
            trust_server_certs: default_trust_server_certs(),
            retry: RetryConfig::default(),
        }
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    endpoint: Option<String>,
    security_mode: Option<SecurityMode>,
    security_policy: Option<SecurityPolicy>,
    user_token: Option<UserTokenType>,
    application_name: Option<String>,
    session_timeout: Option<Duration>,
    pki_dir: Option<String>,
    trust_server_certs: Option<bool>,
    retry: Option<RetryConfig>,
}

impl ClientConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the security mode.
    pub fn security_mode(mut self, mode: SecurityMode) -> Self {
        self.security_mode = Some(mode);
        self
    }

    /// Sets the security policy.
    pub fn security_policy(mut self, policy: SecurityPolicy) -> Self {
        self.security_policy = Some(policy);
        self
    }

    /// Sets username/password authentication.
    pub fn username(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_token = Some(UserTokenType::UserName {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Sets the identity token directly.
    pub fn user_token(mut self, token: UserTokenType) -> Self {
        self.user_token = Some(token);
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the PKI directory.
    pub fn pki_dir(mut self, dir: impl Into<String>) -> Self {
        self.pki_dir = Some(dir.into());
        self
    }

    /// Sets whether server certificates are trusted automatically.
    pub fn trust_server_certs(mut self, trust: bool) -> Self {
        self.trust_server_certs = Some(trust);
        self
    }

    /// Sets the connect retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<ClientConfig, OpcUaError> {
        let endpoint = self.endpoint.ok_or_else(|| {
            OpcUaError::configuration(ConfigurationError::missing_field("endpoint"))
        })?;

        let config = ClientConfig {
            endpoint,
            security_mode: self.security_mode.unwrap_or_default(),
            security_policy: self.security_policy.unwrap_or_default(),
            user_token: self.user_token.unwrap_or_default(),
            application_name: self.application_name.unwrap_or_else(default_application_name),
            session_timeout: self.session_timeout.unwrap_or_else(default_session_timeout),
            pki_dir: self.pki_dir,
            trust_server_certs: self.trust_server_certs.unwrap_or_else(default_trust_server_certs),
            retry: self.retry.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_parse_forms() {
        assert_eq!("i=85".parse::<NodeId>().unwrap(), NodeId::OBJECTS_FOLDER);
        assert_eq!("ObjectsFolder".parse::<NodeId>().unwrap(), NodeId::OBJECTS_FOLDER);
        assert_eq!(
            "ns=3;s=Line1.Press".parse::<NodeId>().unwrap(),
            NodeId::string(3, "Line1.Press")
        );
        assert_eq!(
            "ns=2;b=AQID".parse::<NodeId>().unwrap(),
            NodeId::opaque(2, vec![1, 2, 3])
        );

        let guid = "ns=1;g=550e8400-e29b-41d4-a716-446655440000"
            .parse::<NodeId>()
            .unwrap();
        assert!(matches!(guid.identifier, NodeIdentifier::Guid(_)));
    }

    #[test]
    fn test_node_id_parse_errors() {
        assert!("ns=x;i=1".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("i=abc".parse::<NodeId>().is_err());
        assert!("q=1".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::numeric(0, 85).to_string(), "i=85");
        assert_eq!(NodeId::numeric(2, 1001).to_string(), "ns=2;i=1001");
        assert_eq!(NodeId::opaque(1, vec![1, 2, 3]).to_string(), "ns=1;b=AQID");
    }

    #[test]
    fn test_node_class_values() {
        assert_eq!(NodeClass::from_value(1), NodeClass::Object);
        assert_eq!(NodeClass::from_value(2), NodeClass::Variable);
        assert_eq!(NodeClass::from_value(3), NodeClass::Unspecified);
        assert_eq!(NodeClass::from_value(999), NodeClass::Unspecified);
        assert_eq!(NodeClass::View.value(), 128);
    }

    #[test]
    fn test_only_objects_are_traversable() {
        assert!(NodeClass::Object.is_traversable());
        for class in [
            NodeClass::Unspecified,
            NodeClass::Variable,
            NodeClass::Method,
            NodeClass::ObjectType,
            NodeClass::VariableType,
            NodeClass::ReferenceType,
            NodeClass::DataType,
            NodeClass::View,
        ] {
            assert!(!class.is_traversable(), "{class} must be a leaf");
        }
    }

    #[test]
    fn test_path_record_child_of() {
        let top = PathRecord::child_of("", "Config");
        assert_eq!(top.path, "/Config");
        assert_eq!(top.depth(), 1);

        let nested = PathRecord::child_of("/a/b", "c");
        assert_eq!(nested.path, "/a/b/c");
        assert_eq!(nested.name, "c");
        assert_eq!(nested.depth(), 3);
    }

    #[test]
    fn test_browse_node_name() {
        let node = BrowseNode::variable(NodeId::string(2, "T1"), "Temperature")
            .with_display_name("Temperature (C)");
        assert_eq!(node.name(), "Temperature");
        assert_eq!(node.display_name, "Temperature (C)");
        assert_eq!(node.browse_name.to_string(), "2:Temperature");
    }

    #[test]
    fn test_user_token_from_credentials() {
        assert!(UserTokenType::from_credentials(None, None).is_anonymous());
        assert!(UserTokenType::from_credentials(Some(""), Some("pw")).is_anonymous());
        assert_eq!(
            UserTokenType::from_credentials(Some("op"), None),
            UserTokenType::UserName {
                username: "op".into(),
                password: String::new(),
            }
        );
    }

    #[test]
    fn test_security_parse() {
        assert_eq!("sign_and_encrypt".parse::<SecurityMode>().unwrap(), SecurityMode::SignAndEncrypt);
        assert_eq!(
            SecurityPolicy::Basic256Sha256.uri().parse::<SecurityPolicy>().unwrap(),
            SecurityPolicy::Basic256Sha256
        );
        assert!("rot13".parse::<SecurityPolicy>().is_err());
    }

    #[test]
    fn test_client_config_validation() {
        assert!(ClientConfig::builder().build().is_err());
        assert!(ClientConfig::builder().endpoint("http://x").build().is_err());
        assert!(ClientConfig::builder()
            .endpoint("opc.tcp://x:4840")
            .security_mode(SecurityMode::Sign)
            .build()
            .is_err());

        let config = ClientConfig::builder()
            .endpoint("opc.tcp://x:4840")
            .security_mode(SecurityMode::Sign)
            .security_policy(SecurityPolicy::Basic256Sha256)
            .build()
            .unwrap();
        assert_eq!(config.application_uri(), "urn:uawalk:uawalk");
        assert!(config.trust_server_certs);
    }
}
