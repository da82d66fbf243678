//! In-memory collaborators for auth tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use super::collaborators::{ProfileRepository, SessionStore};
use super::error::CollaboratorError;
use super::manager::AuthManager;
use super::types::{AuthChange, AuthEvent, Identity, Role, Session};
use crate::config::AuthConfig;

// =========================================================================
// Fixtures
// =========================================================================

#[must_use]
pub fn identity(id: Uuid) -> Identity {
    Identity::new(id, format!("{}@example.com", &id.simple().to_string()[..8]))
}

#[must_use]
pub fn session_for(id: Uuid) -> Session {
    Session {
        access_token: format!("access-{id}"),
        refresh_token: Some(format!("refresh-{id}")),
        expires_at: Some(4_102_444_800),
        user: identity(id),
    }
}

#[must_use]
pub fn signed_in(id: Uuid) -> AuthEvent {
    AuthEvent::new(AuthChange::SignedIn, Some(session_for(id)))
}

#[must_use]
pub fn signed_out() -> AuthEvent {
    AuthEvent::new(AuthChange::SignedOut, None)
}

// =========================================================================
// MockSessionStore
// =========================================================================

pub struct MockSessionStore {
    current: Mutex<Option<Session>>,
    probe_error: Mutex<Option<CollaboratorError>>,
    events: broadcast::Sender<AuthEvent>,
    sign_out_fails: AtomicBool,
    probes: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl MockSessionStore {
    #[must_use]
    pub fn new(current: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current: Mutex::new(current),
            probe_error: Mutex::new(None),
            events,
            sign_out_fails: AtomicBool::new(false),
            probes: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub fn set_current(&self, session: Option<Session>) {
        *self.current.lock().unwrap() = session;
    }

    pub fn fail_probe(&self, error: Option<CollaboratorError>) {
        *self.probe_error.lock().unwrap() = error;
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.sign_out_fails.store(fail, Ordering::SeqCst);
    }

    /// Push an event to every subscriber.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionStore for MockSessionStore {
    async fn current_session(&self) -> Result<Option<Session>, CollaboratorError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.probe_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.current.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_out(&self) -> Result<(), CollaboratorError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if self.sign_out_fails.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Network("connection reset".into()));
        }
        *self.current.lock().unwrap() = None;
        Ok(())
    }
}

// =========================================================================
// MockProfiles
// =========================================================================

/// How the next role lookups behave.
#[derive(Clone)]
pub enum Lookup {
    /// Answer immediately.
    Role(Option<Role>),
    /// Fail immediately.
    Fail(CollaboratorError),
    /// Never answer.
    Hang,
    /// Answer once the gate is notified.
    Gated(Arc<Notify>, Option<Role>),
}

pub struct MockProfiles {
    behavior: Mutex<Lookup>,
    calls: AtomicUsize,
}

impl MockProfiles {
    #[must_use]
    pub fn new(behavior: Lookup) -> Self {
        Self { behavior: Mutex::new(behavior), calls: AtomicUsize::new(0) }
    }

    pub fn set(&self, behavior: Lookup) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProfileRepository for MockProfiles {
    async fn role_for_identity(&self, _id: Uuid) -> Result<Option<Role>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Lookup::Role(role) => Ok(role),
            Lookup::Fail(e) => Err(e),
            Lookup::Hang => std::future::pending().await,
            Lookup::Gated(gate, role) => {
                gate.notified().await;
                Ok(role)
            }
        }
    }
}

// =========================================================================
// Harness
// =========================================================================

pub struct Harness {
    pub sessions: Arc<MockSessionStore>,
    pub profiles: Arc<MockProfiles>,
    pub manager: AuthManager,
}

impl Harness {
    #[must_use]
    pub fn new(current: Option<Session>, lookup: Lookup) -> Self {
        Self::with_config(current, lookup, AuthConfig::default())
    }

    #[must_use]
    pub fn with_config(current: Option<Session>, lookup: Lookup, config: AuthConfig) -> Self {
        let sessions = Arc::new(MockSessionStore::new(current));
        let profiles = Arc::new(MockProfiles::new(lookup));
        let manager = AuthManager::new(
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            Arc::clone(&profiles) as Arc<dyn ProfileRepository>,
            config,
        );
        Self { sessions, profiles, manager }
    }
}

/// Poll `condition` until it holds, yielding to spawned tasks in between.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
