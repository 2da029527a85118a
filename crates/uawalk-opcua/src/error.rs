// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while talking to an OPC UA server.
//!
//! Each enum belongs to one crawl stage. The binary maps the stage to an exit
//! code; this module only says whether a failure may be retried and what the
//! operator should check.
//!
//! ```text
//! OpcUaError
//! ├── Connection    endpoint lookup, transport connect, retry budget
//! ├── Session       create and activate (fatal), close (logged only)
//! ├── Browse        a single browse request during the walk
//! └── Configuration rejected client settings
//! ```
//!
//! ```
//! use uawalk_opcua::error::{ConnectionError, OpcUaError};
//!
//! let error = OpcUaError::connection(ConnectionError::refused("opc.tcp://localhost:4840"));
//! assert!(error.is_retryable());
//! assert_eq!(error.error_code().to_string(), "UA-0101");
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

/// Any failure surfaced by the client or the walker.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// The server could not be reached.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The session could not be opened or closed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A browse request failed.
    #[error(transparent)]
    Browse(#[from] BrowseError),

    /// The client settings were rejected before any I/O.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    /// Wraps a [`ConnectionError`].
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Wraps a [`SessionError`].
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Wraps a [`BrowseError`].
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Wraps a [`ConfigurationError`].
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// The server refused the transport connection.
    pub fn connection_refused(endpoint: impl Into<String>) -> Self {
        ConnectionError::refused(endpoint).into()
    }

    /// A session was requested with no transport connected.
    pub fn not_connected() -> Self {
        SessionError::NotConnected.into()
    }

    /// A browse request for `node_id` failed with `message`.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        BrowseError::browse_failed(node_id, message).into()
    }

    /// Whether another attempt at the same call could succeed.
    ///
    /// Only the connect stage acts on this.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Browse(e) => e.is_retryable(),
            Self::Session(_) | Self::Configuration(_) => false,
        }
    }

    /// Stage name used as the `category` log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Browse(_) => "browse",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Stable code for log correlation.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Session(e) => e.error_code(),
            Self::Browse(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Things the operator can check, most likely first.
    pub fn recovery_hints(&self) -> &'static [&'static str] {
        match self {
            Self::Connection(e) => e.recovery_hints(),
            Self::Session(e) => e.recovery_hints(),
            Self::Browse(e) => e.recovery_hints(),
            Self::Configuration(e) => e.recovery_hints(),
        }
    }

    /// Level this error is logged at.
    pub fn level(&self) -> Level {
        match self {
            Self::Session(SessionError::CloseFailed { .. }) => Level::WARN,
            _ => Level::ERROR,
        }
    }

    /// Emits one event for this error; `stage` names what was being done.
    pub fn log(&self, stage: &str) {
        let code = self.error_code();
        let retryable = self.is_retryable();

        if self.level() == Level::WARN {
            tracing::warn!(error_code = %code, category = self.category(), stage, retryable, "{}", self);
        } else {
            tracing::error!(error_code = %code, category = self.category(), stage, retryable, "{}", self);
        }
    }
}

/// Failures before a session exists.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Nothing accepted the connection.
    #[error("{endpoint} refused the connection")]
    Refused {
        /// Endpoint URL.
        endpoint: String,
        /// Socket error, when the transport exposes one.
        #[source]
        source: Option<io::Error>,
    },

    /// Endpoint discovery returned nothing.
    #[error("{endpoint} did not list any endpoints")]
    EndpointNotFound {
        /// Endpoint URL.
        endpoint: String,
    },

    /// The endpoint URL cannot be used.
    #[error("Unusable endpoint URL {url}: {reason}")]
    InvalidEndpoint {
        /// Endpoint URL as given.
        url: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The server offers no endpoint with the requested security.
    #[error("Server has no endpoint offering {security}")]
    NoSuitableEndpoint {
        /// Requested policy and mode.
        security: String,
    },

    /// Every connect attempt failed.
    #[error("Gave up on {endpoint} after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted {
        /// Endpoint URL.
        endpoint: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// Message of the last failure.
        last_error: String,
    },
}

impl ConnectionError {
    /// Refused with no further detail.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            source: None,
        }
    }

    /// Refused with the socket error attached.
    pub fn refused_with(endpoint: impl Into<String>, source: io::Error) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            source: Some(source),
        }
    }

    /// Discovery returned an empty endpoint list.
    pub fn endpoint_not_found(endpoint: impl Into<String>) -> Self {
        Self::EndpointNotFound {
            endpoint: endpoint.into(),
        }
    }

    /// The URL was rejected.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// No endpoint matched `security`.
    pub fn no_suitable_endpoint(security: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security: security.into(),
        }
    }

    /// The retry budget is spent.
    pub fn retries_exhausted(
        endpoint: impl Into<String>,
        attempts: u32,
        last_error: impl fmt::Display,
    ) -> Self {
        Self::RetriesExhausted {
            endpoint: endpoint.into(),
            attempts,
            last_error: last_error.to_string(),
        }
    }

    /// Transient failures only.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Refused { .. } | Self::EndpointNotFound { .. })
    }

    /// Code in category 1.
    pub fn error_code(&self) -> ErrorCode {
        let seq = match self {
            Self::Refused { .. } => 1,
            Self::EndpointNotFound { .. } => 2,
            Self::InvalidEndpoint { .. } => 3,
            Self::NoSuitableEndpoint { .. } => 4,
            Self::RetriesExhausted { .. } => 5,
        };
        ErrorCode::new(ErrorCode::CONNECTION, seq)
    }

    /// Operator hints.
    pub fn recovery_hints(&self) -> &'static [&'static str] {
        match self {
            Self::Refused { .. } | Self::EndpointNotFound { .. } | Self::RetriesExhausted { .. } => &[
                "Is the server process up and listening on that port?",
                "Can this host reach it (DNS, routing, firewall)?",
                "Raise connection.retry.max_retries for slow-starting servers",
            ],
            Self::InvalidEndpoint { .. } => &["Expected opc.tcp://host:port with an optional path"],
            Self::NoSuitableEndpoint { .. } => &[
                "Compare security_policy and security_mode with what the server advertises",
                "Unsecured servers need security_mode None",
            ],
        }
    }
}

/// Failures of the session lifecycle.
#[derive(Debug, Error)]
pub enum SessionError {
    /// CreateSession was rejected.
    #[error("Server rejected the session: {message}")]
    CreationFailed {
        /// Server or stack message.
        message: String,
    },

    /// ActivateSession was rejected.
    #[error("Server rejected the session identity: {message}")]
    ActivationFailed {
        /// Server or stack message.
        message: String,
    },

    /// CloseSession failed during teardown.
    #[error("Session did not close cleanly: {message}")]
    CloseFailed {
        /// Server or stack message.
        message: String,
    },

    /// No session is open.
    #[error("No open session")]
    NotOpen,

    /// A session was requested before the transport connected.
    #[error("Cannot open a session without a connection to the server")]
    NotConnected,
}

impl SessionError {
    /// CreateSession failed.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// ActivateSession failed.
    pub fn activation_failed(message: impl Into<String>) -> Self {
        Self::ActivationFailed {
            message: message.into(),
        }
    }

    /// CloseSession failed.
    pub fn close_failed(message: impl Into<String>) -> Self {
        Self::CloseFailed {
            message: message.into(),
        }
    }

    /// Code in category 2.
    pub fn error_code(&self) -> ErrorCode {
        let seq = match self {
            Self::CreationFailed { .. } => 1,
            Self::ActivationFailed { .. } => 2,
            Self::CloseFailed { .. } => 3,
            Self::NotOpen => 4,
            Self::NotConnected => 5,
        };
        ErrorCode::new(ErrorCode::SESSION, seq)
    }

    /// Operator hints.
    pub fn recovery_hints(&self) -> &'static [&'static str] {
        match self {
            Self::CreationFailed { .. } => &[
                "The server may be at its session limit",
                "The server may not trust this client's certificate",
            ],
            Self::ActivationFailed { .. } => &[
                "Check connection.username and connection.password",
                "Anonymous access may be disabled on the server",
            ],
            Self::CloseFailed { .. } => &["Nothing to do, the server times the session out"],
            Self::NotOpen => &["Open a session before browsing"],
            Self::NotConnected => &["Connect before opening a session"],
        }
    }
}

/// Failure of one browse request.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The request itself failed.
    #[error("Browsing {node_id} failed: {message}")]
    BrowseFailed {
        /// Node that was browsed.
        node_id: String,
        /// Server or stack message.
        message: String,
    },

    /// The server answered with a Bad status.
    #[error("Browsing {node_id} returned status 0x{status_code:08X}")]
    BadStatus {
        /// Node that was browsed.
        node_id: String,
        /// Raw status code.
        status_code: u32,
    },
}

impl BrowseError {
    /// The request failed.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// The result carried a Bad status.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
        }
    }

    /// Transport-level failures may clear up; a Bad status will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BrowseFailed { .. })
    }

    /// The node that was being browsed.
    pub fn node_id(&self) -> &str {
        match self {
            Self::BrowseFailed { node_id, .. } | Self::BadStatus { node_id, .. } => node_id,
        }
    }

    /// Code in category 4.
    pub fn error_code(&self) -> ErrorCode {
        let seq = match self {
            Self::BrowseFailed { .. } => 1,
            Self::BadStatus { .. } => 2,
        };
        ErrorCode::new(ErrorCode::BROWSE, seq)
    }

    /// Operator hints.
    pub fn recovery_hints(&self) -> &'static [&'static str] {
        match self {
            Self::BrowseFailed { .. } => &[
                "The session user may lack browse rights on this node",
                "Set walk.on_browse_error to partial to keep the rest of the tree",
            ],
            Self::BadStatus { .. } => &[
                "Look the status code up in the server's diagnostics",
                "The session user may lack browse rights on this node",
            ],
        }
    }
}

/// Client settings rejected before connecting.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Unusable endpoint URL.
    #[error("endpoint '{url}' rejected: {reason}")]
    InvalidEndpoint {
        /// URL as given.
        url: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Node id that does not parse.
    #[error("node id '{node_id}' rejected: {reason}")]
    InvalidNodeId {
        /// Text as given.
        node_id: String,
        /// Parser message.
        reason: String,
    },

    /// Policy and mode that cannot be combined.
    #[error("security settings rejected: {message}")]
    InvalidSecurity {
        /// What is wrong.
        message: String,
    },

    /// Timeout outside what the stack accepts.
    #[error("timeout {duration:?} rejected: {reason}")]
    InvalidTimeout {
        /// Value as given.
        duration: Duration,
        /// What is wrong with it.
        reason: String,
    },

    /// Required setting left empty.
    #[error("'{field}' is required")]
    MissingField {
        /// Setting name.
        field: String,
    },

    /// Unknown security mode name.
    #[error("unknown security mode '{mode}'")]
    InvalidSecurityMode {
        /// Name as given.
        mode: String,
    },

    /// Unknown security policy name.
    #[error("unknown security policy '{policy}'")]
    InvalidSecurityPolicy {
        /// Name as given.
        policy: String,
    },

    /// Backoff parameters that cannot work.
    #[error("retry settings rejected: {message}")]
    InvalidRetry {
        /// What is wrong.
        message: String,
    },
}

impl ConfigurationError {
    /// See [`Self::InvalidEndpoint`].
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// See [`Self::InvalidNodeId`].
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// See [`Self::InvalidSecurity`].
    pub fn invalid_security(message: impl Into<String>) -> Self {
        Self::InvalidSecurity {
            message: message.into(),
        }
    }

    /// See [`Self::InvalidTimeout`].
    pub fn invalid_timeout(duration: Duration, reason: impl Into<String>) -> Self {
        Self::InvalidTimeout {
            duration,
            reason: reason.into(),
        }
    }

    /// See [`Self::MissingField`].
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// See [`Self::InvalidSecurityMode`].
    pub fn invalid_security_mode(mode: impl Into<String>) -> Self {
        Self::InvalidSecurityMode { mode: mode.into() }
    }

    /// See [`Self::InvalidSecurityPolicy`].
    pub fn invalid_security_policy(policy: impl Into<String>) -> Self {
        Self::InvalidSecurityPolicy {
            policy: policy.into(),
        }
    }

    /// See [`Self::InvalidRetry`].
    pub fn invalid_retry(message: impl Into<String>) -> Self {
        Self::InvalidRetry {
            message: message.into(),
        }
    }

    /// Code in category 8.
    pub fn error_code(&self) -> ErrorCode {
        let seq = match self {
            Self::InvalidEndpoint { .. } => 1,
            Self::InvalidNodeId { .. } => 2,
            Self::InvalidSecurity { .. } => 3,
            Self::InvalidTimeout { .. } => 4,
            Self::MissingField { .. } => 5,
            Self::InvalidSecurityMode { .. } => 6,
            Self::InvalidSecurityPolicy { .. } => 7,
            Self::InvalidRetry { .. } => 8,
        };
        ErrorCode::new(ErrorCode::CONFIGURATION, seq)
    }

    /// Operator hints.
    pub fn recovery_hints(&self) -> &'static [&'static str] {
        match self {
            Self::InvalidEndpoint { .. } => &["Expected opc.tcp://host:port with an optional path"],
            Self::InvalidNodeId { .. } => &[
                "Accepted forms: i=85, ns=2;i=1001, ns=2;s=Line1, ns=1;g=<uuid>, ns=1;b=<base64>",
                "ObjectsFolder is accepted as an alias for i=85",
            ],
            Self::InvalidSecurity { .. }
            | Self::InvalidSecurityMode { .. }
            | Self::InvalidSecurityPolicy { .. } => &[
                "Modes are None, Sign and SignAndEncrypt",
                "Policy None only pairs with mode None",
            ],
            Self::InvalidTimeout { .. } => &["Use a positive duration such as 5s"],
            Self::MissingField { .. } => &["Set it in the config file or pass it as a flag"],
            Self::InvalidRetry { .. } => &[
                "multiplier >= 1.0 and 0.0 <= jitter <= 1.0",
                "initial_delay must not exceed max_delay",
            ],
        }
    }
}

/// Numeric error code, rendered as `UA-CCNN` in hex.
///
/// The high byte is the category, the low byte the error within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Connection category.
    pub const CONNECTION: u8 = 0x01;
    /// Session category.
    pub const SESSION: u8 = 0x02;
    /// Browse category.
    pub const BROWSE: u8 = 0x04;
    /// Configuration category.
    pub const CONFIGURATION: u8 = 0x08;

    /// Builds a code from its category and sequence number.
    pub const fn new(category: u8, seq: u8) -> Self {
        Self(((category as u16) << 8) | seq as u16)
    }

    /// Category byte.
    pub const fn category(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Raw value.
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:04X}", self.0)
    }
}

/// Result alias for this crate.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_rendering() {
        assert_eq!(ErrorCode::new(ErrorCode::CONNECTION, 1).to_string(), "UA-0101");
        assert_eq!(ErrorCode::new(ErrorCode::BROWSE, 2).to_string(), "UA-0402");
        assert_eq!(ErrorCode::new(8, 7).as_u16(), 0x0807);
        assert_eq!(ErrorCode::new(8, 7).category(), ErrorCode::CONFIGURATION);
    }

    #[test]
    fn test_only_transient_connect_failures_retry() {
        assert!(ConnectionError::refused("opc.tcp://x:4840").is_retryable());
        assert!(ConnectionError::endpoint_not_found("opc.tcp://x:4840").is_retryable());
        assert!(!ConnectionError::invalid_endpoint("http://x", "bad scheme").is_retryable());
        assert!(!ConnectionError::retries_exhausted("opc.tcp://x:4840", 3, "refused").is_retryable());
        assert!(!OpcUaError::session(SessionError::creation_failed("BadTooManySessions")).is_retryable());
    }

    #[test]
    fn test_close_failure_is_only_a_warning() {
        let close = OpcUaError::session(SessionError::close_failed("BadSessionIdInvalid"));
        assert_eq!(close.level(), Level::WARN);

        let create = OpcUaError::session(SessionError::creation_failed("BadTooManySessions"));
        assert_eq!(create.level(), Level::ERROR);

        let unconnected = OpcUaError::not_connected();
        assert_eq!(unconnected.level(), Level::ERROR);
        assert_eq!(unconnected.category(), "session");
        assert_eq!(unconnected.error_code().to_string(), "UA-0205");
    }

    #[test]
    fn test_browse_errors_name_the_node() {
        let err = BrowseError::bad_status("ns=2;s=Line1", 0x8034_0000);
        assert_eq!(err.node_id(), "ns=2;s=Line1");
        assert_eq!(err.to_string(), "Browsing ns=2;s=Line1 returned status 0x80340000");

        let err = OpcUaError::browse_failed("i=85", "BadTimeout");
        assert_eq!(err.category(), "browse");
        assert_eq!(err.to_string(), "Browsing i=85 failed: BadTimeout");
        assert!(!err.recovery_hints().is_empty());
    }

    #[test]
    fn test_retries_exhausted_keeps_last_error() {
        let err = ConnectionError::retries_exhausted("opc.tcp://plc:4840", 4, "refused");
        assert_eq!(
            err.to_string(),
            "Gave up on opc.tcp://plc:4840 after 4 attempts, last error: refused"
        );
        assert_eq!(OpcUaError::from(err).error_code().to_string(), "UA-0105");
    }
}
