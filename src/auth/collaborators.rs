//! External contracts consumed by the auth manager.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session store (identity provider) and the profile repository
//! (relational store) live outside this crate. `platform` provides HTTP
//! implementations; tests provide in-memory mocks.

use tokio::sync::broadcast;
use uuid::Uuid;

use super::error::CollaboratorError;
use super::types::{AuthEvent, Role, Session};

/// Identity provider issuing bearer sessions.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Probe for the current session, refreshing it first if the store
    /// knows how to.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the store could not be reached.
    async fn current_session(&self) -> Result<Option<Session>, CollaboratorError>;

    /// Subscribe to identity-change notifications. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the session could not be ended.
    async fn sign_out(&self) -> Result<(), CollaboratorError>;
}

/// Maps an identity to its role.
#[async_trait::async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Single-row lookup keyed by identity id. `Ok(None)` means the profile
    /// exists without a usable role, or does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the lookup itself failed.
    async fn role_for_identity(&self, id: Uuid) -> Result<Option<Role>, CollaboratorError>;
}
