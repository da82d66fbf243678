//! Session store backed by the hosted auth endpoints.
//!
//! ARCHITECTURE
//! ============
//! Sessions are obtained with a password grant and kept in memory. Every
//! change to the cached session is announced on a broadcast feed, which
//! the auth manager consumes as its identity-change stream.
//!
//! TRADE-OFFS
//! ==========
//! An expired session is refreshed lazily on the next probe rather than on
//! a timer. A refresh the backend rejects ends the session locally, since
//! the refresh token is no longer usable.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::Method;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use super::PlatformClient;
use crate::auth::{AuthChange, AuthEvent, CollaboratorError, Identity, Session, SessionStore};

/// Refresh this long before the issuer's expiry.
const EXPIRY_SKEW: Duration = Duration::from_secs(30);
const FEED_CAPACITY: usize = 32;

// =============================================================================
// STORE
// =============================================================================

pub struct HttpSessionStore {
    client: PlatformClient,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl HttpSessionStore {
    #[must_use]
    pub fn new(client: PlatformClient) -> Self {
        let (events, _) = broadcast::channel(FEED_CAPACITY);
        Self { client, current: RwLock::new(None), events }
    }

    /// Exchange email and password for a session.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Backend`] with status 400 for bad
    /// credentials, or a transport error.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, CollaboratorError> {
        let request = self
            .client
            .request(Method::POST, "/auth/v1/token?grant_type=password")
            .json(&serde_json::json!({ "email": email, "password": password }));
        let body = self.client.send(request).await?;
        let session = parse_session(&body, SystemTime::now())?;
        info!(identity = %session.user.id, "signed in");
        self.replace(Some(session.clone()), AuthChange::SignedIn);
        Ok(session)
    }

    /// Trade the cached refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Unauthorized`] when no refresh token is
    /// cached, or whatever the token endpoint reports.
    pub async fn refresh_session(&self) -> Result<Session, CollaboratorError> {
        let refresh_token = self
            .cached()
            .and_then(|s| s.refresh_token)
            .ok_or(CollaboratorError::Unauthorized)?;
        let request = self
            .client
            .request(Method::POST, "/auth/v1/token?grant_type=refresh_token")
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        let body = self.client.send(request).await?;
        let session = parse_session(&body, SystemTime::now())?;
        self.replace(Some(session.clone()), AuthChange::TokenRefreshed);
        Ok(session)
    }

    /// Bearer token of the cached session, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.cached().map(|s| s.access_token)
    }

    fn cached(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, session: Option<Session>, change: AuthChange) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session.clone();
        // No subscribers is fine.
        let _ = self.events.send(AuthEvent::new(change, session));
    }
}

#[async_trait::async_trait]
impl SessionStore for HttpSessionStore {
    async fn current_session(&self) -> Result<Option<Session>, CollaboratorError> {
        let Some(session) = self.cached() else {
            return Ok(None);
        };
        if !session.expires_within(SystemTime::now(), EXPIRY_SKEW) {
            return Ok(Some(session));
        }
        match self.refresh_session().await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(e) if is_rejected_refresh(&e) => {
                warn!(identity = %session.user.id, error = %e, "session refresh rejected, ending session");
                self.replace(None, AuthChange::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_out(&self) -> Result<(), CollaboratorError> {
        let Some(token) = self.access_token() else {
            return Ok(());
        };
        let request = self
            .client
            .request(Method::POST, "/auth/v1/logout")
            .bearer_auth(token);
        match self.client.send(request).await {
            // An already-invalid token means the session is gone server-side.
            Ok(_) | Err(CollaboratorError::Unauthorized | CollaboratorError::NotFound) => {
                self.replace(None, AuthChange::SignedOut);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// The token endpoint refused the refresh token itself.
fn is_rejected_refresh(e: &CollaboratorError) -> bool {
    matches!(e, CollaboratorError::Unauthorized | CollaboratorError::Backend { status: 400, .. })
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    expires_at: Option<u64>,
    user: UserRecord,
}

#[derive(Deserialize)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
}

/// Parse a token-endpoint response. A missing `expires_at` is derived from
/// `expires_in` relative to `now`.
///
/// # Errors
///
/// Returns [`CollaboratorError::Malformed`] if the body is not a session.
pub fn parse_session(body: &str, now: SystemTime) -> Result<Session, CollaboratorError> {
    let resp: TokenResponse =
        serde_json::from_str(body).map_err(|e| CollaboratorError::Malformed(format!("token response: {e}")))?;
    if resp.access_token.is_empty() {
        return Err(CollaboratorError::Malformed("token response: empty access_token".into()));
    }
    let expires_at = resp.expires_at.or_else(|| {
        let now_secs = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        resp.expires_in.map(|secs| now_secs.saturating_add(secs))
    });
    let email = resp.user.email.filter(|e| !e.trim().is_empty());
    Ok(Session {
        access_token: resp.access_token,
        refresh_token: resp.refresh_token.filter(|t| !t.is_empty()),
        expires_at,
        user: Identity { id: resp.user.id, email },
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
