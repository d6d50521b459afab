use std::time::Duration;

use super::*;

#[tokio::test]
async fn limiter_follows_config() {
    let state = test_helpers::test_app_state();
    assert_eq!(state.config.auth_rate_limit, 10);
    for _ in 0..state.config.auth_rate_limit {
        state.auth_limiter.check_and_record("a@example.org").unwrap();
    }
    assert!(state.auth_limiter.check_and_record("a@example.org").is_err());
    assert!(state.auth_limiter.check_and_record("b@example.org").is_ok());
}

#[tokio::test]
async fn clones_share_the_limiter() {
    let mut config = test_helpers::test_config();
    config.auth_rate_limit = 1;
    config.auth_rate_window = Duration::from_secs(60);
    let state = AppState::new(test_helpers::lazy_pool(), config, None);
    let clone = state.clone();

    state.auth_limiter.check_and_record("a@example.org").unwrap();
    assert!(clone.auth_limiter.check_and_record("a@example.org").is_err());
    assert!(clone.mailer.is_none());
}
