//! Auth state manager: single source of truth for the current user.
//!
//! DESIGN
//! ======
//! The manager reconciles the session store's push feed (sign-in, refresh,
//! sign-out) with a pull-based role lookup against the profile repository.
//! State lives in a `watch` channel: every write replaces the whole
//! `AuthState` and wakes all subscribers, so the UI never observes a
//! partially updated value.
//!
//! CONCURRENCY
//! ===========
//! - At most one live role lookup per identity is in flight. A second
//!   request for the same identity is coalesced (dropped), not queued.
//!   A lookup whose epoch has been superseded is no longer live: a new
//!   request for that identity takes over its slot instead of coalescing.
//! - Every lookup races a fixed timeout; failure and timeout both settle
//!   into "known identity, previous-or-unknown role".
//! - An epoch counter is bumped whenever a reconciliation starts or the
//!   state is cleared. A lookup applies its result only if its epoch is
//!   still current, so a late lookup cannot resurrect a signed-out user.
//!   All state writes happen while holding the epoch lock.
//!
//! TRADE-OFFS
//! ==========
//! Coalescing means a token-refresh event for an identity whose lookup is
//! already running is discarded, and the in-flight result (carrying the
//! older session) wins. This avoids duplicate lookups and write races at
//! the cost of briefly caching the previous bearer token.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::collaborators::{ProfileRepository, SessionStore};
use super::error::AuthError;
use super::types::{AuthChange, AuthEvent, AuthState, Role, Session};
use crate::config::AuthConfig;

// =============================================================================
// TRIGGER
// =============================================================================

/// What started a state transition. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Mount,
    Event(AuthChange),
    Refresh,
    Periodic,
    FeedLagged,
    SignOut,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mount => f.write_str("mount"),
            Self::Event(change) => write!(f, "event:{change}"),
            Self::Refresh => f.write_str("refresh"),
            Self::Periodic => f.write_str("periodic"),
            Self::FeedLagged => f.write_str("feed_lagged"),
            Self::SignOut => f.write_str("sign_out"),
        }
    }
}

// =============================================================================
// AUTH MANAGER
// =============================================================================

/// Handle to an auth state manager. Clones share the same state.
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: Arc<dyn SessionStore>,
    profiles: Arc<dyn ProfileRepository>,
    config: AuthConfig,
    state: watch::Sender<AuthState>,
    /// Identity ids with a role lookup in progress, keyed to the epoch the
    /// lookup was started in.
    in_flight: Mutex<HashMap<Uuid, u64>>,
    /// Reconciliation epoch. Held while writing `state`.
    epoch: Mutex<u64>,
    mounted: AtomicBool,
    torn_down: AtomicBool,
    /// Feed listener and refresh ticker, aborted on unmount.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AuthManager {
    /// Create an unmounted manager in the initial loading state.
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, profiles: Arc<dyn ProfileRepository>, config: AuthConfig) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        Self {
            inner: Arc::new(Inner {
                sessions,
                profiles,
                config,
                state,
                in_flight: Mutex::new(HashMap::new()),
                epoch: Mutex::new(0),
                mounted: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start listening to the identity feed, probe the current session and
    /// schedule the periodic refresh. Must be called inside a Tokio runtime.
    pub fn mount(&self) {
        if self.inner.mounted.swap(true, Ordering::AcqRel) {
            warn!("auth manager already mounted");
            return;
        }

        // Subscribe before probing so no change between the two is lost.
        let feed = self.inner.sessions.subscribe();
        let mut tasks = lock(&self.inner.tasks);
        tasks.push(tokio::spawn(listen(Arc::clone(&self.inner), feed)));
        if let Some(ticker) = spawn_refresh_ticker(Arc::clone(&self.inner)) {
            tasks.push(ticker);
        }
        drop(tasks);

        self.inner.spawn_probe(Trigger::Mount);
        info!(
            lookup_timeout_ms = millis(self.inner.config.lookup_timeout),
            refresh_interval_secs = self.inner.config.refresh_interval.as_secs(),
            "auth manager mounted"
        );
    }

    /// Stop the feed listener and refresh ticker. Lookups already running
    /// finish on their own; their results are discarded.
    pub fn unmount(&self) {
        {
            let mut epoch = lock(&self.inner.epoch);
            *epoch += 1;
            self.inner.torn_down.store(true, Ordering::Release);
        }
        for handle in lock(&self.inner.tasks).drain(..) {
            handle.abort();
        }
        info!("auth manager unmounted");
    }

    /// Current cached state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Observe state changes. Each write notifies every receiver.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Wait until the state is no longer loading and return it.
    pub async fn settled(&self) -> AuthState {
        let mut rx = self.inner.state.subscribe();
        match rx.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Re-probe the session store and reconcile. Never fails: any error
    /// settles the state with `loading == false` and is logged.
    pub async fn refresh(&self) {
        if self.inner.is_torn_down() {
            return;
        }
        self.inner.write(|s| {
            let changed = !s.loading;
            s.loading = true;
            changed
        });
        self.inner.probe_and_reconcile(Trigger::Refresh).await;
    }

    /// End the session and reset to the logged-out state.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SignOut`] if the session store refused; the
    /// state is left untouched in that case.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let identity = self.state().identity_id();
        if let Err(e) = self.inner.sessions.sign_out().await {
            warn!(error = %e, code = e.error_code(), identity = ?identity, "sign-out failed");
            return Err(AuthError::SignOut(e));
        }
        self.inner.clear(Trigger::SignOut);
        info!(identity = ?identity, "signed out");
        Ok(())
    }

    /// Identity ids whose role lookup is in progress.
    #[must_use]
    pub fn in_flight(&self) -> Vec<Uuid> {
        lock(&self.inner.in_flight).keys().copied().collect()
    }

    #[must_use]
    pub fn is_in_flight(&self, id: Uuid) -> bool {
        lock(&self.inner.in_flight).contains_key(&id)
    }
}

// =============================================================================
// IN-FLIGHT MARKER
// =============================================================================

/// Membership in the in-flight set. Dropping it removes the identity, so
/// the marker cannot leak on error, timeout, panic or task abort. A marker
/// that was taken over by a newer lookup leaves the newer entry alone.
struct InFlight {
    inner: Arc<Inner>,
    id: Uuid,
    epoch: u64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.inner.in_flight);
        if in_flight.get(&self.id) == Some(&self.epoch) {
            in_flight.remove(&self.id);
        }
    }
}

// =============================================================================
// RECONCILIATION
// =============================================================================

impl Inner {
    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    fn has_in_flight(&self) -> bool {
        !lock(&self.in_flight).is_empty()
    }

    /// Write state under the epoch lock. Skipped after teardown.
    fn write(&self, modify: impl FnOnce(&mut AuthState) -> bool) {
        let _epoch = lock(&self.epoch);
        if self.is_torn_down() {
            return;
        }
        self.state.send_if_modified(modify);
    }

    /// Reset to the fully-null shape and invalidate running lookups.
    fn clear(&self, trigger: Trigger) {
        let mut epoch = lock(&self.epoch);
        *epoch += 1;
        if self.is_torn_down() {
            return;
        }
        self.state.send_replace(AuthState::signed_out());
        debug!(%trigger, "auth state cleared");
    }

    /// Mark loading finished without touching anything else.
    fn settle(&self) {
        self.write(|s| {
            let changed = s.loading;
            s.loading = false;
            changed
        });
    }

    /// Claim the in-flight slot for `id` and open a new epoch. `None` means
    /// a lookup for this identity is already running and can still apply
    /// its result. A slot held by a superseded lookup is taken over.
    ///
    /// Lock order is epoch, then in-flight set.
    fn begin(self: &Arc<Self>, id: Uuid) -> Option<InFlight> {
        let mut epoch = lock(&self.epoch);
        if self.is_torn_down() {
            return None;
        }
        let mut in_flight = lock(&self.in_flight);
        if let Some(&held) = in_flight.get(&id) {
            if held == *epoch {
                return None;
            }
            debug!(identity = %id, stale_epoch = held, "taking over superseded lookup");
        }
        *epoch += 1;
        in_flight.insert(id, *epoch);
        Some(InFlight { inner: Arc::clone(self), id, epoch: *epoch })
    }

    /// Role to keep when a lookup fails: the cached role, but only if it
    /// belongs to the same identity.
    fn previous_role(&self, id: Uuid) -> Option<Role> {
        let state = self.state.borrow();
        if state.identity_id() == Some(id) { state.role } else { None }
    }

    async fn resolve(&self, marker: InFlight, session: Session, trigger: Trigger) {
        let id = marker.id;
        let lookup = tokio::time::timeout(self.config.lookup_timeout, self.profiles.role_for_identity(id)).await;

        let role = match lookup {
            Ok(Ok(role)) => {
                debug!(identity = %id, %trigger, role = ?role, "role resolved");
                role
            }
            Ok(Err(e)) => {
                let role = self.previous_role(id);
                warn!(identity = %id, %trigger, error = %e, code = e.error_code(), "role lookup failed, keeping previous role");
                role
            }
            Err(_) => {
                let role = self.previous_role(id);
                warn!(
                    identity = %id,
                    %trigger,
                    timeout_ms = millis(self.config.lookup_timeout),
                    "role lookup timed out, keeping previous role"
                );
                role
            }
        };

        let epoch = marker.epoch;
        drop(marker);

        let current = lock(&self.epoch);
        if *current != epoch || self.is_torn_down() {
            debug!(identity = %id, %trigger, "discarding stale reconciliation");
            return;
        }
        self.state.send_replace(AuthState::authenticated(session, role));
    }

    /// Apply one push notification from the identity feed.
    fn on_event(self: &Arc<Self>, event: AuthEvent) {
        if self.is_torn_down() {
            return;
        }
        let trigger = Trigger::Event(event.change);
        let Some(session) = event.effective_session().cloned() else {
            self.clear(trigger);
            return;
        };
        let id = session.user.id;
        let Some(marker) = self.begin(id) else {
            debug!(identity = %id, %trigger, "lookup already in flight, coalescing");
            return;
        };
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.resolve(marker, session, trigger).await;
        });
    }

    async fn probe_and_reconcile(self: &Arc<Self>, trigger: Trigger) {
        let probe = tokio::time::timeout(self.config.lookup_timeout, self.sessions.current_session()).await;
        match probe {
            Ok(Ok(Some(session))) => {
                let id = session.user.id;
                match self.begin(id) {
                    Some(marker) => self.resolve(marker, session, trigger).await,
                    None => debug!(identity = %id, %trigger, "lookup already in flight, coalescing"),
                }
            }
            Ok(Ok(None)) => self.clear(trigger),
            Ok(Err(e)) => {
                warn!(%trigger, error = %e, code = e.error_code(), "session probe failed");
                self.settle();
            }
            Err(_) => {
                warn!(%trigger, timeout_ms = millis(self.config.lookup_timeout), "session probe timed out");
                self.settle();
            }
        }
    }

    fn spawn_probe(self: &Arc<Self>, trigger: Trigger) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.probe_and_reconcile(trigger).await;
        });
    }
}

// =============================================================================
// BACKGROUND TASKS
// =============================================================================

async fn listen(inner: Arc<Inner>, mut feed: broadcast::Receiver<AuthEvent>) {
    loop {
        match feed.recv().await {
            Ok(event) => inner.on_event(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "identity feed lagged, re-probing session");
                inner.spawn_probe(Trigger::FeedLagged);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("identity feed closed");
                break;
            }
        }
    }
}

fn spawn_refresh_ticker(inner: Arc<Inner>) -> Option<JoinHandle<()>> {
    let period = inner.config.refresh_interval;
    if period.is_zero() {
        warn!("refresh interval is zero, periodic refresh disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if inner.has_in_flight() {
                debug!("role lookup in flight, skipping periodic refresh");
                continue;
            }
            inner.spawn_probe(Trigger::Periodic);
        }
    }))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
