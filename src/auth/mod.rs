//! Authentication and session-state management.
//!
//! ARCHITECTURE
//! ============
//! `manager` owns the process-wide `AuthState` and is the only writer.
//! `collaborators` defines the session-store and profile-repository
//! contracts it consumes; `guard` turns state into routing decisions.

pub mod collaborators;
pub mod error;
pub mod guard;
pub mod manager;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use collaborators::{ProfileRepository, SessionStore};
pub use error::{AuthError, CollaboratorError};
pub use guard::{GuardDecision, evaluate};
pub use manager::AuthManager;
pub use types::{AuthChange, AuthEvent, AuthState, AuthStatus, Identity, Role, Session};
