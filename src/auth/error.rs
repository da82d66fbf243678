//! Error kinds crossing the collaborator boundary.
//!
//! DESIGN
//! ======
//! Adapters normalize whatever their backend throws into the closed
//! `CollaboratorError` set before it reaches the manager, so reconciliation
//! logic never inspects transport-specific error shapes.

// =============================================================================
// COLLABORATOR ERROR
// =============================================================================

/// Failure reported by a session store or profile repository.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The backend did not answer in time.
    #[error("request timed out")]
    Timeout,

    /// Credentials were missing, expired or rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// The addressed record does not exist.
    #[error("not found")]
    NotFound,

    /// The backend answered with a non-success status.
    #[error("backend error: status {status}: {message}")]
    Backend { status: u16, message: String },

    /// The response could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CollaboratorError {
    /// Stable code for logs and UI messages.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Timeout => "E_TIMEOUT",
            Self::Unauthorized => "E_UNAUTHORIZED",
            Self::NotFound => "E_NOT_FOUND",
            Self::Backend { .. } => "E_BACKEND",
            Self::Malformed(_) => "E_MALFORMED",
        }
    }

    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Backend { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// AUTH ERROR
// =============================================================================

/// Errors the auth manager surfaces to its callers. Only sign-out reports
/// failure; every other operation degrades into a settled state instead.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("sign-out failed: {0}")]
    SignOut(#[source] CollaboratorError),
}
