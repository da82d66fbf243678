//! Route guard decisions derived from `AuthState`.
//!
//! SYSTEM CONTEXT
//! ==============
//! Pages call `evaluate` with the current state and the roles they accept.
//! The guard has no state of its own; rendering the decision is up to the
//! routing layer.

use super::types::{AuthState, Role};

pub const LOGIN_PATH: &str = "/login";
pub const ROOT_PATH: &str = "/";

/// What the routing layer should do with a guarded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth has not settled; show a neutral waiting indicator.
    Wait,
    /// No identity. `return_to` is the originally requested location.
    RedirectToLogin { return_to: Option<String> },
    /// Signed in without an accepted role.
    RedirectToLanding { path: &'static str },
    Render,
}

/// Decide how to handle a request for `requested_path`. An empty `required`
/// slice accepts any signed-in user, with or without a role.
#[must_use]
pub fn evaluate(state: &AuthState, required: &[Role], requested_path: &str) -> GuardDecision {
    if state.loading {
        return GuardDecision::Wait;
    }
    if state.identity.is_none() {
        let return_to = (!requested_path.is_empty() && !is_login_path(requested_path)).then(|| requested_path.to_owned());
        return GuardDecision::RedirectToLogin { return_to };
    }
    if required.is_empty() {
        return GuardDecision::Render;
    }
    match state.role {
        Some(role) if required.contains(&role) => GuardDecision::Render,
        Some(role) => GuardDecision::RedirectToLanding { path: role.landing_path() },
        None => GuardDecision::RedirectToLanding { path: ROOT_PATH },
    }
}

/// Login URL carrying the bounce-back target as a `redirect` query value.
#[must_use]
pub fn login_url(return_to: Option<&str>) -> String {
    match return_to {
        Some(path) => format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(path)),
        None => LOGIN_PATH.to_owned(),
    }
}

fn is_login_path(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.trim_end_matches('/') == LOGIN_PATH
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
