use uuid::Uuid;

use super::*;
use crate::auth::test_helpers::session_for;

fn signed_in_as(role: Option<Role>) -> AuthState {
    AuthState::authenticated(session_for(Uuid::new_v4()), role)
}

// =============================================================
// Loading and anonymous
// =============================================================

#[test]
fn waits_while_loading() {
    let state = AuthState::initial();
    assert_eq!(evaluate(&state, &[Role::Operator], "/admin"), GuardDecision::Wait);
}

#[test]
fn waits_during_refresh_even_when_signed_in() {
    let mut state = signed_in_as(Some(Role::Vendor));
    state.loading = true;
    assert_eq!(evaluate(&state, &[Role::Vendor], "/vendor"), GuardDecision::Wait);
}

#[test]
fn anonymous_is_sent_to_login_with_return_path() {
    let state = AuthState::signed_out();
    assert_eq!(
        evaluate(&state, &[], "/vendor/tasks?activity=7"),
        GuardDecision::RedirectToLogin { return_to: Some("/vendor/tasks?activity=7".into()) }
    );
}

#[test]
fn anonymous_on_login_page_has_no_return_path() {
    let state = AuthState::signed_out();
    assert_eq!(evaluate(&state, &[], "/login/"), GuardDecision::RedirectToLogin { return_to: None });
    assert_eq!(evaluate(&state, &[], "/login?x=1"), GuardDecision::RedirectToLogin { return_to: None });
}

// =============================================================
// Role checks
// =============================================================

#[test]
fn empty_requirement_accepts_any_signed_in_user() {
    assert_eq!(evaluate(&signed_in_as(None), &[], "/profile"), GuardDecision::Render);
    assert_eq!(evaluate(&signed_in_as(Some(Role::Client)), &[], "/profile"), GuardDecision::Render);
}

#[test]
fn matching_role_renders() {
    let state = signed_in_as(Some(Role::Operator));
    assert_eq!(evaluate(&state, &[Role::Operator, Role::Vendor], "/activities"), GuardDecision::Render);
}

#[test]
fn wrong_role_goes_to_own_landing() {
    let state = signed_in_as(Some(Role::Client));
    assert_eq!(
        evaluate(&state, &[Role::Operator], "/admin/vendors"),
        GuardDecision::RedirectToLanding { path: "/client" }
    );
}

#[test]
fn unknown_role_with_requirement_goes_to_root() {
    let state = signed_in_as(None);
    assert_eq!(evaluate(&state, &[Role::Vendor], "/vendor"), GuardDecision::RedirectToLanding { path: ROOT_PATH });
}

// =============================================================
// login_url
// =============================================================

#[test]
fn login_url_without_target() {
    assert_eq!(login_url(None), "/login");
}

#[test]
fn login_url_encodes_query_characters() {
    assert_eq!(
        login_url(Some("/vendor/tasks?activity=7&x=a b")),
        "/login?redirect=%2Fvendor%2Ftasks%3Factivity%3D7%26x%3Da%20b"
    );
}

#[test]
fn login_url_encodes_non_ascii_as_utf8() {
    assert_eq!(login_url(Some("/client/café")), "/login?redirect=%2Fclient%2Fcaf%C3%A9");
}
