//! Auth domain types: identity, session, role, and the manager's state.
//!
//! DESIGN
//! ======
//! `AuthState` is the single value observed by the UI layer. It is replaced
//! wholesale on every transition so observers never see a half-applied
//! update. The settled logged-out shape is fully null: no role or session
//! may outlive the identity they belong to.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// IDENTITY
// =============================================================================

/// Authenticated user record issued by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self { id, email: Some(email.into()) }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Bearer credential plus expiry. The manager only ever holds a read-only copy.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry as unix seconds. `None` means the issuer did not say.
    pub expires_at: Option<u64>,
    pub user: Identity,
}

impl Session {
    /// True when the session expires within `skew` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: SystemTime, skew: Duration) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        let now_secs = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        expires_at <= now_secs.saturating_add(skew.as_secs())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_within(SystemTime::now(), Duration::ZERO)
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

// =============================================================================
// ROLE
// =============================================================================

/// Authorization tier controlling which feature areas a user may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Internal staff. Stored as `operator`, `admin` or `cupshup`.
    #[serde(alias = "admin", alias = "cupshup")]
    Operator,
    Vendor,
    Client,
}

impl Role {
    /// Parse a stored role name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "operator" | "admin" | "cupshup" => Some(Self::Operator),
            "vendor" => Some(Self::Vendor),
            "client" => Some(Self::Client),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Vendor => "vendor",
            Self::Client => "client",
        }
    }

    /// Default landing area for this role.
    #[must_use]
    pub fn landing_path(self) -> &'static str {
        match self {
            Self::Operator => "/admin",
            Self::Vendor => "/vendor",
            Self::Client => "/client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// AUTH STATE
// =============================================================================

/// Cached answer to "who is the current user and what can they do".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub session: Option<Session>,
    pub loading: bool,
}

impl AuthState {
    /// State at application start, before the first probe settles.
    #[must_use]
    pub fn initial() -> Self {
        Self { identity: None, role: None, session: None, loading: true }
    }

    /// Settled logged-out shape.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { identity: None, role: None, session: None, loading: false }
    }

    /// Settled authenticated shape. The identity is taken from the session.
    #[must_use]
    pub fn authenticated(session: Session, role: Option<Role>) -> Self {
        Self { identity: Some(session.user.clone()), role, session: Some(session), loading: false }
    }

    #[must_use]
    pub fn identity_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|i| i.id)
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        if self.loading {
            return AuthStatus::Loading;
        }
        match self.identity {
            Some(_) => AuthStatus::Authenticated { role: self.role },
            None => AuthStatus::Unauthenticated,
        }
    }

    /// Settled and logged out implies no role and no session.
    #[must_use]
    pub fn is_settled_consistent(&self) -> bool {
        self.loading || self.identity.is_some() || (self.role.is_none() && self.session.is_none())
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Coarse view of `AuthState` for consumers that only branch on status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Loading,
    Authenticated { role: Option<Role> },
    Unauthenticated,
}

// =============================================================================
// IDENTITY-CHANGE FEED
// =============================================================================

/// Kind of change pushed by the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChange {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthChange {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        }
    }
}

impl fmt::Display for AuthChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification from the identity-change feed.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub change: AuthChange,
    pub session: Option<Session>,
}

impl AuthEvent {
    #[must_use]
    pub fn new(change: AuthChange, session: Option<Session>) -> Self {
        Self { change, session }
    }

    /// The session this event establishes, if any. Sign-out events and
    /// events missing a session both count as "no session".
    #[must_use]
    pub fn effective_session(&self) -> Option<&Session> {
        match self.change {
            AuthChange::SignedOut => None,
            _ => self.session.as_ref(),
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
