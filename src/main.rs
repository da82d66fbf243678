use std::sync::Arc;

use cupshup::auth::guard::{self, GuardDecision};
use cupshup::auth::{AuthManager, AuthState, AuthStatus, ProfileRepository, Role, SessionStore};
use cupshup::config::{AuthConfig, PlatformConfig};
use cupshup::platform::{HttpProfileRepository, HttpSessionStore, PlatformClient};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let platform = PlatformConfig::from_env().expect("backend config required");
    let client = PlatformClient::new(platform).expect("http client init failed");
    let sessions = Arc::new(HttpSessionStore::new(client.clone()));
    let profiles = Arc::new(HttpProfileRepository::new(client, Arc::clone(&sessions)));

    let manager = AuthManager::new(
        Arc::clone(&sessions) as Arc<dyn SessionStore>,
        profiles as Arc<dyn ProfileRepository>,
        AuthConfig::from_env(),
    );
    manager.mount();

    // Optional sign-in; the manager picks it up from the identity feed.
    if let (Ok(email), Ok(password)) = (std::env::var("CUPSHUP_EMAIL"), std::env::var("CUPSHUP_PASSWORD")) {
        if let Err(e) = sessions.sign_in_with_password(&email, &password).await {
            tracing::error!(error = %e, code = e.error_code(), "sign-in failed");
        }
    }

    let mut rx = manager.subscribe();
    log_state(&rx.borrow_and_update().clone());
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                log_state(&state);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if manager.state().identity.is_some() {
        if let Err(e) = manager.sign_out().await {
            tracing::error!(error = %e, "sign-out failed, session still active");
        }
    }
    manager.unmount();
}

fn log_state(state: &AuthState) {
    let admin_area = match guard::evaluate(state, &[Role::Operator], "/admin") {
        GuardDecision::Wait => "waiting".to_owned(),
        GuardDecision::RedirectToLogin { return_to } => guard::login_url(return_to.as_deref()),
        GuardDecision::RedirectToLanding { path } => path.to_owned(),
        GuardDecision::Render => "/admin".to_owned(),
    };
    match state.status() {
        AuthStatus::Loading => tracing::info!("auth loading"),
        AuthStatus::Authenticated { role } => tracing::info!(
            identity = ?state.identity_id(),
            role = role.map_or("unknown", Role::as_str),
            %admin_area,
            "authenticated"
        ),
        AuthStatus::Unauthenticated => tracing::info!(%admin_area, "signed out"),
    }
}
