//! Error types for oltlink.
//!
//! Every failure surfaces as one [`Error`], whose variant tells the caller
//! which category it belongs to (see [`Error::kind`]). Transport-level
//! detail lives in [`TransportError`].

use std::io;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Main error type for oltlink operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The OLT is unreachable or refused the login.
    #[error("Connection error: {0}")]
    Connection(#[from] TransportError),

    /// A command was sent but the device or the session failed it.
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    /// No adapter is registered for the requested vendor.
    #[error("Unsupported vendor '{vendor}' (supported: {})", supported.join(", "))]
    UnsupportedVendor {
        vendor: String,
        supported: Vec<String>,
    },

    /// The device rejected an ONT provisioning or deprovisioning request.
    #[error("Provisioning failed: {message}")]
    Provisioning { message: String },

    /// The device rejected a configuration change, or the request was invalid.
    #[error("Configuration failed: {message}")]
    Configuration { message: String },

    /// The referenced ONT, port or credential does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// No session could be checked out of the pool in time.
    #[error("Session pool exhausted ({capacity} in use, waited {waited:?})")]
    PoolExhausted { capacity: usize, waited: Duration },

    /// Key derivation, encryption or decryption failed.
    #[error("Credential error: {message}")]
    Credential { message: String },

    /// The device output matched none of the expected shapes.
    #[error("Parse error: {message}")]
    Parse { message: String },
}

/// Transport layer errors (TCP, SSH, Telnet login).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to open the TCP connection.
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error.
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed.
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key not present in known_hosts (strict mode).
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the known_hosts entry.
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written.
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The session is not connected.
    #[error("Not connected")]
    NotConnected,

    /// Connection was closed by the peer.
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse error category, for callers that map errors onto API responses
/// or retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Command,
    UnsupportedVendor,
    Provisioning,
    Configuration,
    NotFound,
    PoolExhausted,
    Credential,
    Parse,
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) => ErrorKind::Connection,
            Error::Command { .. } => ErrorKind::Command,
            Error::UnsupportedVendor { .. } => ErrorKind::UnsupportedVendor,
            Error::Provisioning { .. } => ErrorKind::Provisioning,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            Error::Credential { .. } => ErrorKind::Credential,
            Error::Parse { .. } => ErrorKind::Parse,
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection | ErrorKind::Command | ErrorKind::PoolExhausted
        )
    }

    pub(crate) fn command(command: impl Into<String>, message: impl ToString) -> Self {
        Error::Command {
            command: command.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn provisioning(message: impl Into<String>) -> Self {
        Error::Provisioning {
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(resource: impl Into<String>) -> Self {
        Error::NotFound {
            resource: resource.into(),
        }
    }

    pub(crate) fn credential(message: impl Into<String>) -> Self {
        Error::Credential {
            message: message.into(),
        }
    }
}

/// Result type alias using oltlink's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_vendor_lists_vendors() {
        let err = Error::UnsupportedVendor {
            vendor: "nokia".to_string(),
            supported: vec!["huawei".to_string(), "zte".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported vendor 'nokia' (supported: huawei, zte)"
        );
        assert_eq!(err.kind(), ErrorKind::UnsupportedVendor);
    }

    #[test]
    fn test_transport_error_is_connection_kind() {
        let err: Error = TransportError::Disconnected.into();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_error_not_transient() {
        assert!(!Error::parse("garbage").is_transient());
        assert!(!Error::not_found("ONT 0/1/0:5").is_transient());
    }
}
