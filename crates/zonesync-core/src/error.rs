//! Error types for zonesync
//!
//! Validation problems are *not* errors: records and zones report them as
//! [`ValidationError`](crate::record::ValidationError) values. This module
//! covers the failures that abort an operation: malformed input that cannot
//! be turned into a record or config, and provider failures.
//!
//! Provider failures are split in two groups:
//!
//! - **Transient** ([`Error::Timeout`], [`Error::ConnectionReset`],
//!   [`Error::UnparseableResponse`], [`Error::RateLimited`]): retried by
//!   [`RetryPolicy`](crate::retry::RetryPolicy) up to a per-class budget.
//! - **Protocol** (everything else): raised immediately.

use crate::retry::RateLimit;
use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Class of a transient provider failure, each with its own retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    /// The remote call timed out
    Timeout,
    /// The connection was reset or refused
    ConnectionReset,
    /// The response body could not be parsed
    UnparseableResponse,
    /// The provider asked us to slow down
    RateLimited,
}

/// Core error type for zonesync
#[derive(Error, Debug)]
pub enum Error {
    /// A record definition is missing fields or has the wrong shape
    #[error("Invalid record definition: {0}")]
    InvalidRecord(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A zone refers to a provider identifier nobody registered
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Remote call timed out
    #[error("Provider error ({provider}): request timed out: {message}")]
    Timeout {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Connection reset or refused by the remote end
    #[error("Provider error ({provider}): connection reset: {message}")]
    ConnectionReset {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The provider answered with a body we could not parse
    #[error("Provider error ({provider}): unparseable response: {message}")]
    UnparseableResponse {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The provider throttled the request
    #[error("Provider error ({provider}): rate limited ({limit})")]
    RateLimited {
        /// Provider name
        provider: String,
        /// Remaining quota and reset window reported by the provider
        limit: RateLimit,
    },

    /// Authentication errors
    #[error("Provider error ({provider}): authentication failed: {message}")]
    Authentication {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Record not found on the provider side
    #[error("Provider error ({provider}): record not found: {message}")]
    RecordNotFound {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The record behind an id does not have the expected fqdn or type
    #[error("Provider error ({provider}): record mismatch: {message}")]
    RecordMismatch {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The provider cannot store this record type
    #[error("Provider error ({provider}): unsupported record type {record_type}")]
    UnsupportedRecordType {
        /// Provider name
        provider: String,
        /// Offending record type
        record_type: String,
    },

    /// An update was planned against a record the provider never identified
    #[error("Cannot update {0}: the current record has no provider id")]
    MissingRecordId(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a connection reset error
    pub fn connection_reset(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionReset {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an unparseable response error
    pub fn unparseable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnparseableResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limited(provider: impl Into<String>, limit: RateLimit) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            limit,
        }
    }

    /// Create an authentication error
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authentication {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a "record not found" error
    pub fn not_found(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordNotFound {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a record mismatch error
    pub fn mismatch(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordMismatch {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported record type error
    pub fn unsupported(provider: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self::UnsupportedRecordType {
            provider: provider.into(),
            record_type: record_type.into(),
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Which retry budget this error draws from, if any
    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            Self::Timeout { .. } => Some(TransientKind::Timeout),
            Self::ConnectionReset { .. } => Some(TransientKind::ConnectionReset),
            Self::UnparseableResponse { .. } => Some(TransientKind::UnparseableResponse),
            Self::RateLimited { .. } => Some(TransientKind::RateLimited),
            _ => None,
        }
    }

    /// Whether the retry policy may retry this error
    pub fn is_transient(&self) -> bool {
        self.transient_kind().is_some()
    }
}
