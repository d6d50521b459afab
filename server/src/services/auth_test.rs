use super::*;

fn pending() -> AuthPhase {
    AuthPhase::Unauthenticated
        .session_started(Uuid::nil(), "tok".into())
        .expect("start from unauthenticated")
}

// =============================================================================
// happy path
// =============================================================================

#[test]
fn session_started_moves_to_role_pending() {
    assert_eq!(pending(), AuthPhase::RolePending { user_id: Uuid::nil(), token: "tok".into() });
}

#[test]
fn role_resolved_moves_to_resolved() {
    let phase = pending().role_resolved(Role::Admin).unwrap();
    assert_eq!(phase, AuthPhase::Resolved { user_id: Uuid::nil(), token: "tok".into(), role: Role::Admin });
}

#[test]
fn resolved_converts_into_signed_in() {
    let signed_in = pending()
        .role_resolved(Role::User)
        .unwrap()
        .into_signed_in("a@example.org".into())
        .unwrap();
    assert_eq!(signed_in.token, "tok");
    assert_eq!(signed_in.user.email, "a@example.org");
    assert_eq!(signed_in.user.role, Role::User);
}

// =============================================================================
// forced sign-out
// =============================================================================

#[test]
fn role_failed_returns_to_unauthenticated_with_token_to_revoke() {
    let (phase, token) = pending().role_failed().unwrap();
    assert_eq!(phase, AuthPhase::Unauthenticated);
    assert_eq!(token, "tok");
}

#[test]
fn signed_out_from_any_phase() {
    assert_eq!(AuthPhase::Unauthenticated.signed_out(), AuthPhase::Unauthenticated);
    assert_eq!(pending().signed_out(), AuthPhase::Unauthenticated);
    let resolved = pending().role_resolved(Role::User).unwrap();
    assert_eq!(resolved.signed_out(), AuthPhase::Unauthenticated);
}

// =============================================================================
// invalid transitions
// =============================================================================

#[test]
fn cannot_start_second_session_while_pending() {
    let err = pending().session_started(Uuid::nil(), "other".into()).unwrap_err();
    assert_eq!(err, TransitionError { from: "role_pending", event: "session_started" });
}

#[test]
fn cannot_resolve_role_without_session() {
    let err = AuthPhase::Unauthenticated.role_resolved(Role::Admin).unwrap_err();
    assert_eq!(err.from, "unauthenticated");
}

#[test]
fn cannot_fail_role_after_resolution() {
    let resolved = pending().role_resolved(Role::User).unwrap();
    assert_eq!(resolved.role_failed().unwrap_err().from, "resolved");
}

#[test]
fn pending_phase_is_not_a_sign_in() {
    let err = pending().into_signed_in("a@example.org".into()).unwrap_err();
    assert_eq!(err.event, "into_signed_in");
}

#[test]
fn transition_error_message_names_phase_and_event() {
    let err = TransitionError { from: "resolved", event: "role_failed" };
    assert_eq!(err.to_string(), "invalid auth transition: role_failed while resolved");
}

#[test]
fn role_lookup_failure_message_is_user_facing() {
    let err = AuthError::RoleLookupFailed(RoleError::ProfileMissing(Uuid::nil()));
    assert_eq!(err.to_string(), "could not resolve account role; signed out");
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn missing_profile_forces_sign_out() {
    let pool = crate::state::test_helpers::live_pool().await;
    let user_id = crate::state::test_helpers::seed_user(&pool, Role::User).await;
    sqlx::query("DELETE FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let result = start_session(&pool, Duration::from_secs(60), user_id, "x@example.org".into()).await;
    assert!(matches!(result, Err(AuthError::RoleLookupFailed(RoleError::ProfileMissing(_)))));

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0, "session must be revoked");
}
