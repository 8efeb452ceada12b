//! Error taxonomy for the integration client.
//!
//! Network-layer failures are retried inside the executor; only the final
//! failure reaches the caller, wrapped with a [`RequestContext`] describing
//! where it happened. Per-record sync failures never appear here; they are
//! reported in-band as [`crate::sync::SyncFailure`].

use std::fmt;

use thiserror::Error;

/// Where a failed request was aimed and how hard the executor tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Shop domain the request targeted.
    pub host: String,
    /// Endpoint relative to the versioned API prefix (e.g., `orders.json`).
    pub endpoint: String,
    /// HTTP method.
    pub method: String,
    /// Number of attempts made before giving up.
    pub attempts: u32,
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on {} after {} attempt{}",
            self.method,
            self.endpoint,
            self.host,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )
    }
}

/// Machine-checkable category of an [`IntegrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or empty credentials; no request was sent.
    Authentication,
    /// Missing or malformed caller input; no request was sent.
    Validation,
    /// Upstream kept answering 429 until retries ran out.
    RateLimited,
    /// Upstream answered with a non-2xx status.
    Upstream,
    /// Connection failure, timeout or other transport problem.
    Transport,
    /// Upstream answered 2xx with a body that did not match the expected shape.
    Decode,
}

/// Errors surfaced by the Shopify integration client.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Credentials were missing before any request was attempted.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Caller-supplied input was invalid before any request was attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limited on every attempt.
    #[error("Rate limited by Shopify ({context})")]
    RateLimited {
        /// Request that was being retried.
        context: RequestContext,
    },

    /// Upstream returned a non-2xx, non-429 status.
    #[error("Shopify API error ({status}) for {context}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Raw response body text.
        body: String,
        /// Request that failed.
        context: RequestContext,
    },

    /// HTTP transport failed.
    #[error("HTTP error for {context}: {source}")]
    Transport {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
        /// Request that failed.
        context: RequestContext,
    },

    /// Response body could not be decoded.
    #[error("JSON parse error for {context}: {message}")]
    Decode {
        /// What went wrong.
        message: String,
        /// Request that failed.
        context: RequestContext,
    },
}

impl IntegrationError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Validation(_) => ErrorKind::Validation,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// Upstream HTTP status, when the failure carried one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Upstream { status, .. } => Some(*status),
            Self::Transport { .. }
            | Self::Decode { .. }
            | Self::Authentication(_)
            | Self::Validation(_) => None,
        }
    }

    /// Request context for network-layer failures.
    #[must_use]
    pub const fn context(&self) -> Option<&RequestContext> {
        match self {
            Self::RateLimited { context }
            | Self::Upstream { context, .. }
            | Self::Transport { context, .. }
            | Self::Decode { context, .. } => Some(context),
            Self::Authentication(_) | Self::Validation(_) => None,
        }
    }

    /// Whether the upstream rejected the credentials (401/403).
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Upstream { status: 401 | 403, .. })
    }
}
