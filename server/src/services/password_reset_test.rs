use std::sync::Mutex;

use async_trait::async_trait;

use super::*;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError("provider rejected message".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_owned(), subject.to_owned(), html.to_owned()));
        Ok(())
    }
}

// =============================================================================
// codes
// =============================================================================

#[test]
fn normalize_code_uppercases_and_trims() {
    let code = generate_reset_code();
    assert_eq!(normalize_code(&code), Some(code.clone()));
    assert_eq!(normalize_code("  abc234 "), Some("ABC234".to_owned()));
}

#[test]
fn normalize_code_rejects_bad_shapes() {
    assert_eq!(normalize_code("ABC23"), None);
    assert_eq!(normalize_code("ABC2345"), None);
    // 0, 1, I and O are excluded from the alphabet.
    assert_eq!(normalize_code("ABC1I0"), None);
    assert_eq!(normalize_code("ABCO23"), None);
    assert_eq!(normalize_code("ABC23!"), None);
}

#[test]
fn generated_codes_use_the_alphabet() {
    for _ in 0..50 {
        let code = generate_reset_code();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "bad code {code}");
    }
}

#[test]
fn hash_is_stable_hex_sha256() {
    let a = hash_reset_code("ABC234");
    assert_eq!(a, hash_reset_code("ABC234"));
    assert_ne!(a, hash_reset_code("ABC235"));
    assert_eq!(a.len(), 64);
}

#[test]
fn render_reset_email_fills_placeholders() {
    let html = render_reset_email("user@example.org", "ABC234", "https://grants.example.org/reset-password");
    assert!(html.contains("user@example.org"));
    assert!(html.contains("ABC234"));
    assert!(html.contains("https://grants.example.org/reset-password"));
    assert!(!html.contains("{{"));
}

#[test]
fn render_reset_email_escapes_markup() {
    let html = render_reset_email("<b>\"x\"</b>@example.org", "ABC234", "https://grants.example.org/r?a=1&b=2");
    assert!(!html.contains("<b>"));
    assert!(html.contains("&lt;b&gt;&quot;x&quot;&lt;/b&gt;@example.org"));
    assert!(html.contains("https://grants.example.org/r?a=1&amp;b=2"));
}

#[test]
fn html_escape_leaves_plain_text_alone() {
    assert_eq!(html_escape("dana@example.org"), "dana@example.org");
    assert_eq!(html_escape("O'Hara & Co"), "O&#39;Hara &amp; Co");
}

// =============================================================================
// delivery
// =============================================================================

#[tokio::test]
async fn send_code_delivers_rendered_email() {
    let mailer = RecordingMailer::default();
    send_code(&mailer, "user@example.org", "ABC234", Some("https://grants.example.org"))
        .await
        .unwrap();

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (to, subject, html) = &sent[0];
    assert_eq!(to, "user@example.org");
    assert_eq!(subject, RESET_SUBJECT);
    assert!(html.contains("ABC234"));
    assert!(html.contains("https://grants.example.org/reset-password"));
}

#[tokio::test]
async fn send_code_surfaces_provider_failure() {
    let mailer = RecordingMailer { fail: true, ..RecordingMailer::default() };
    let err = send_code(&mailer, "user@example.org", "ABC234", None).await.unwrap_err();
    assert!(matches!(err, PasswordResetError::Delivery(_)));
}

// =============================================================================
// update
// =============================================================================

#[test]
fn mismatched_confirmation_is_rejected() {
    let err = ensure_passwords_match("hunter22", Some("hunter23")).unwrap_err();
    assert_eq!(err.to_string(), "Passwords do not match.");
}

#[test]
fn confirmation_is_optional() {
    assert!(ensure_passwords_match("hunter22", None).is_ok());
    assert!(ensure_passwords_match("hunter22", Some("hunter22")).is_ok());
}

#[tokio::test]
async fn update_password_checks_confirmation_before_database() {
    // A lazily connected pool would fail on first use; the mismatch must
    // short-circuit before any query.
    let pool = crate::state::test_helpers::lazy_pool();
    let err = update_password(&pool, Uuid::nil(), "tok", "hunter22", Some("nope"), 8)
        .await
        .unwrap_err();
    assert!(matches!(err, PasswordResetError::PasswordMismatch));
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::services::role::Role;
    use crate::state::test_helpers::{live_pool, seed_user};

    async fn email_of(pool: &PgPool, user_id: Uuid) -> String {
        sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn code_from(html: &str) -> String {
        let start = html.find("letter-spacing:6px;font-weight:bold;\">").unwrap() + 38;
        html[start..start + CODE_LEN].to_owned()
    }

    #[tokio::test]
    async fn unknown_email_succeeds_silently() {
        let pool = live_pool().await;
        let mailer = RecordingMailer::default();
        request_password_reset(&pool, Some(&mailer), "nobody-here@example.org", None)
            .await
            .unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn emailed_code_verifies_once() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool, Role::User).await;
        let email = email_of(&pool, user_id).await;
        let mailer = RecordingMailer::default();

        request_password_reset(&pool, Some(&mailer), &email, None).await.unwrap();
        let code = code_from(&mailer.sent.lock().unwrap()[0].2);

        assert_eq!(verify_otp(&pool, &email, &code).await.unwrap(), (user_id, email.clone()));
        assert!(matches!(
            verify_otp(&pool, &email, &code).await,
            Err(PasswordResetError::VerificationFailed)
        ));
    }

    async fn codes_for(pool: &PgPool, email: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_codes WHERE email = $1")
            .bind(email)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn purge_removes_consumed_codes_only() {
        let pool = live_pool().await;
        let used = email_of(&pool, seed_user(&pool, Role::User).await).await;
        let pending = email_of(&pool, seed_user(&pool, Role::User).await).await;
        let mailer = RecordingMailer::default();

        request_password_reset(&pool, Some(&mailer), &used, None).await.unwrap();
        let code = code_from(&mailer.sent.lock().unwrap()[0].2);
        verify_otp(&pool, &used, &code).await.unwrap();
        request_password_reset(&pool, Some(&mailer), &pending, None).await.unwrap();

        assert!(purge_stale_codes(&pool).await.unwrap() >= 1);
        assert_eq!(codes_for(&pool, &used).await, 0);
        assert_eq!(codes_for(&pool, &pending).await, 1);
    }

    #[tokio::test]
    async fn code_burns_after_five_wrong_guesses() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool, Role::User).await;
        let email = email_of(&pool, user_id).await;
        let mailer = RecordingMailer::default();

        request_password_reset(&pool, Some(&mailer), &email, None).await.unwrap();
        let code = code_from(&mailer.sent.lock().unwrap()[0].2);
        let wrong = if code == "AAAAAA" { "BBBBBB" } else { "AAAAAA" };

        for _ in 0..MAX_FAILED_ATTEMPTS {
            assert!(verify_otp(&pool, &email, wrong).await.is_err());
        }
        assert!(matches!(
            verify_otp(&pool, &email, &code).await,
            Err(PasswordResetError::VerificationFailed)
        ));
    }
}
