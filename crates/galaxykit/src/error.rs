//! Error types for Galaxy API operations.
//!
//! Errors are categorized so callers can branch on the few outcomes that
//! drive reconciliation (not found, conflict) without matching on messages.

use std::fmt;

/// Result type alias for Galaxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of Galaxy errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport failure (connection refused, timeout, TLS).
    Network,
    /// The requested entity does not exist.
    NotFound,
    /// Create collided with an existing, possibly soft-deleted, entity.
    Conflict,
    /// Galaxy rejected the request.
    Api,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Entity not found",
            Self::Conflict => "Entity already exists",
            Self::Api => "Request rejected by Galaxy",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the Galaxy host is reachable and try again",
            Self::NotFound => "The entity may have been removed outside of this tool",
            Self::Conflict => "Pick another name or undelete the existing entity",
            Self::Api => "Check the request attributes and the API key permissions",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur talking to Galaxy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind.
        kind: String,
        /// Requested identity.
        id: String,
    },

    /// Create collided with an existing entity.
    #[error("conflict: {message}")]
    Conflict {
        /// Galaxy `err_code`, if reported.
        code: Option<i64>,
        /// Galaxy `err_msg`.
        message: String,
    },

    /// Galaxy answered with an error status.
    #[error("Galaxy API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {message}")]
    Http {
        message: String,
        status: Option<u16>,
    },

    /// Response body could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The entity kind does not support this operation.
    #[error("{kind} does not support {operation}")]
    Unsupported {
        kind: &'static str,
        operation: &'static str,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

/// Message fragments Galaxy uses when a create collides with an existing name
const CONFLICT_MARKERS: &[&str] = &["already exists", "is taken", "address exists"];

impl Error {
    /// Create a not-found error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            code: None,
            message: message.into(),
        }
    }

    /// Classify an error response.
    ///
    /// `body` is Galaxy's error document (`{"err_msg": .., "err_code": ..}`);
    /// anything else is reported verbatim.
    pub fn from_response(kind: &str, id: &str, status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("err_msg"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| body.trim().to_string(), str::to_string);
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("err_code"))
            .and_then(serde_json::Value::as_i64);

        if status == 404 {
            return Self::not_found(kind, id);
        }
        if matches!(status, 400 | 409) && CONFLICT_MARKERS.iter().any(|m| message.contains(m)) {
            return Self::Conflict { code, message };
        }
        Self::Api {
            status,
            code,
            message,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Api { .. } => ErrorCategory::Api,
            Self::Http { .. } => ErrorCategory::Network,
            Self::InvalidResponse(_) | Self::Unsupported { .. } | Self::Other(_) => {
                ErrorCategory::Other
            }
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
