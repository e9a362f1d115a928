//! Error types for the broker REST client
//!
//! Every failed request surfaces as exactly one [`Error`] variant. Status-driven
//! variants carry the text the broker supplied when it supplied any; transport
//! variants carry a message written for the end user plus, for
//! [`Error::Connection`], the original failure for debugging.

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Exit code reported when the broker answered with something we could not
/// make sense of.
pub const SERVER_RESPONSE_EXIT_CODE: i64 = 129;

/// Main error type for broker operations
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (refused connection, interrupted stream, bad gateway)
    #[error("{message}")]
    Connection {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The connect or receive timeout elapsed
    #[error("{message}")]
    Timeout { message: String },

    /// The server presented a certificate it signed itself
    #[error("{message}")]
    SelfSignedCertificate { message: String },

    /// The server certificate did not pass verification
    #[error("{message}")]
    CertificateVerificationFailed { message: String },

    /// The TLS handshake failed for any other reason
    #[error("{message}")]
    SslConnectionFailed { message: String },

    /// The server refused the negotiated TLS protocol version
    #[error("{message}")]
    SslVersionRejected { message: String },

    /// 401 from the broker
    #[error("{message}")]
    Unauthorized { message: String },

    /// 403 from the broker
    #[error("{message}")]
    RequestDenied { message: String },

    /// 404 from the broker
    #[error("{message}")]
    ResourceNotFound { message: String },

    /// 409/422 from the broker
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        exit_code: Option<i64>,
    },

    /// 400 from the broker
    #[error("{message}")]
    ClientError { message: String },

    /// 500, unexpected status codes, or unreadable responses
    #[error("{message}")]
    ServerError {
        message: String,
        exit_code: Option<i64>,
    },

    /// 503 from the broker
    #[error("{message}")]
    ServiceUnavailable { message: String },

    /// Invalid client configuration (config file, CA file, proxy, transport setup)
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Request body could not be encoded
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Kind tag for an [`Error`], independent of its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Connection,
    Timeout,
    SelfSignedCertificate,
    CertificateVerificationFailed,
    SslConnectionFailed,
    SslVersionRejected,
    Unauthorized,
    RequestDenied,
    ResourceNotFound,
    Validation,
    ClientError,
    ServerError,
    ServiceUnavailable,
    Configuration,
    Json,
}

impl Error {
    /// Connection failure without an underlying error
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Connection failure that keeps the original error for debugging
    pub fn connection_with_source(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Connection {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn validation(message: impl Into<String>, field: Option<String>, exit_code: Option<i64>) -> Self {
        Error::Validation {
            message: message.into(),
            field,
            exit_code,
        }
    }

    pub fn server_error(message: impl Into<String>, exit_code: Option<i64>) -> Self {
        Error::ServerError {
            message: message.into(),
            exit_code,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// The kind tag of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::SelfSignedCertificate { .. } => ErrorKind::SelfSignedCertificate,
            Error::CertificateVerificationFailed { .. } => ErrorKind::CertificateVerificationFailed,
            Error::SslConnectionFailed { .. } => ErrorKind::SslConnectionFailed,
            Error::SslVersionRejected { .. } => ErrorKind::SslVersionRejected,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::RequestDenied { .. } => ErrorKind::RequestDenied,
            Error::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::ClientError { .. } => ErrorKind::ClientError,
            Error::ServerError { .. } => ErrorKind::ServerError,
            Error::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Json { .. } => ErrorKind::Json,
        }
    }

    /// Field the broker attributed this error to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Exit code supplied by the broker (or 129 for unreadable responses)
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            Error::Validation { exit_code, .. } | Error::ServerError { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Whether retrying the whole operation later could succeed.
    ///
    /// The executor never retries these itself beyond its own policy.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connection | ErrorKind::Timeout)
    }

    /// Mutable access to the message, used when the classifier merges
    /// several messages for the same field.
    pub(crate) fn message_mut(&mut self) -> Option<&mut String> {
        match self {
            Error::Connection { message, .. }
            | Error::Timeout { message }
            | Error::SelfSignedCertificate { message }
            | Error::CertificateVerificationFailed { message }
            | Error::SslConnectionFailed { message }
            | Error::SslVersionRejected { message }
            | Error::Unauthorized { message }
            | Error::RequestDenied { message }
            | Error::ResourceNotFound { message }
            | Error::Validation { message, .. }
            | Error::ClientError { message }
            | Error::ServerError { message, .. }
            | Error::ServiceUnavailable { message } => Some(message),
            Error::Configuration { .. } | Error::Json { .. } => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Json {
            message: source.to_string(),
            source,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::SelfSignedCertificate => "self_signed_certificate",
            ErrorKind::CertificateVerificationFailed => "certificate_verification_failed",
            ErrorKind::SslConnectionFailed => "ssl_connection_failed",
            ErrorKind::SslVersionRejected => "ssl_version_rejected",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RequestDenied => "request_denied",
            ErrorKind::ResourceNotFound => "resource_not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::ClientError => "client_error",
            ErrorKind::ServerError => "server_error",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Json => "json",
        };
        write!(f, "{}", name)
    }
}
