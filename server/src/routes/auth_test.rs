use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::routing::{get, post};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::*;
use crate::state::test_helpers::{lazy_pool, test_app_state, test_config};

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/signin", post(signin))
        .route("/api/auth/signout", post(signout))
        .route("/api/auth/me", get(me))
        .route("/api/auth/password-reset", post(request_password_reset))
        .route("/api/auth/update-password", post(update_password))
        .with_state(state)
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn error_message(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    body["error"].as_str().unwrap_or_default().to_owned()
}

/// State allowing one attempt per address, already spent by `email`.
fn exhausted_limiter_state(email: &str) -> AppState {
    let mut config = test_config();
    config.auth_rate_limit = 1;
    let state = AppState::new(lazy_pool(), config, None);
    state.auth_limiter.check_and_record(email).unwrap();
    state
}

// =============================================================================
// cookies
// =============================================================================

#[test]
fn session_cookie_is_http_only_with_ttl() {
    let cookie = session_cookie("tok".into(), true, std::time::Duration::from_secs(3600));
    assert_eq!(cookie.name(), SESSION_COOKIE);
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.max_age(), Some(Duration::hours(1)));
}

#[test]
fn signed_out_flag_is_script_readable() {
    let cookie = signed_out_cookie(false);
    assert_eq!(cookie.name(), SIGNED_OUT_COOKIE);
    assert_eq!(cookie.value(), "1");
    assert_eq!(cookie.http_only(), Some(false));
}

#[test]
fn sign_in_sets_session_and_clears_flag() {
    let jar = signed_in_jar(&test_config(), "tok".into());
    assert_eq!(jar.get(SESSION_COOKIE).map(Cookie::value), Some("tok"));
    let flag = jar.get(SIGNED_OUT_COOKIE).unwrap();
    assert_eq!(flag.value(), "");
    assert_eq!(flag.max_age(), Some(Duration::ZERO));
}

#[test]
fn sign_out_clears_session_and_sets_flag() {
    let jar = signed_out_jar(&test_config());
    assert_eq!(jar.get(SESSION_COOKIE).and_then(Cookie::max_age), Some(Duration::ZERO));
    assert_eq!(jar.get(SIGNED_OUT_COOKIE).map(Cookie::value), Some("1"));
}

#[test]
fn limiter_key_normalizes_email() {
    assert_eq!(limiter_key("  Dana@Example.ORG "), "dana@example.org");
    assert_eq!(limiter_key(" Not An Email "), "not an email");
}

// =============================================================================
// handlers without a database
// =============================================================================

#[tokio::test]
async fn signup_rejects_mismatched_confirmation() {
    let response = router(test_app_state())
        .oneshot(json_post(
            "/api/auth/signup",
            serde_json::json!({ "email": "a@example.org", "password": "hunter22", "confirm_password": "hunter23" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(error_message(response).await, "Passwords do not match.");
}

#[tokio::test]
async fn signin_is_rate_limited_per_address() {
    let state = exhausted_limiter_state("a@example.org");

    let response = router(state)
        .oneshot(json_post("/api/auth/signin", serde_json::json!({ "email": "a@example.org", "password": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn password_reset_is_rate_limited() {
    let state = exhausted_limiter_state("a@example.org");

    let response = router(state)
        .oneshot(json_post("/api/auth/password-reset", serde_json::json!({ "email": "a@example.org" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn session_routes_require_a_session() {
    let app = router(test_app_state());
    let me = Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap();
    assert_eq!(app.clone().oneshot(me).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let signout = Request::builder().method("POST").uri("/api/auth/signout").body(Body::empty()).unwrap();
    assert_eq!(app.clone().oneshot(signout).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let update = json_post("/api/auth/update-password", serde_json::json!({ "password": "hunter22" }));
    assert_eq!(app.oneshot(update).await.unwrap().status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn signup_then_signout_round() {
    use axum::http::header::COOKIE;

    let pool = crate::state::test_helpers::live_pool().await;
    let app = router(AppState::new(pool, test_config(), None));
    let email = format!("route-{}@example.org", uuid::Uuid::new_v4());

    let response = app
        .clone()
        .oneshot(json_post("/api/auth/signup", serde_json::json!({ "email": email, "password": "hunter22" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| Cookie::parse(v.to_str().ok()?.to_owned()).ok())
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .unwrap();

    let signout = Request::builder()
        .method("POST")
        .uri("/api/auth/signout")
        .header(COOKIE, format!("{SESSION_COOKIE}={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(signout).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let me = Request::builder()
        .uri("/api/auth/me")
        .header(COOKIE, format!("{SESSION_COOKIE}={token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(me).await.unwrap().status(), StatusCode::UNAUTHORIZED);
}
