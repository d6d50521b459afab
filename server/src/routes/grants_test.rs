use super::*;

#[test]
fn export_format_defaults_to_csv() {
    assert_eq!(parse_export_format(None).unwrap(), ExportFormat::Csv);
    assert_eq!(parse_export_format(Some("  ")).unwrap(), ExportFormat::Csv);
}

#[test]
fn export_format_is_parsed() {
    assert_eq!(parse_export_format(Some("XLSX")).unwrap(), ExportFormat::Xlsx);
    assert_eq!(parse_export_format(Some("pdf")).unwrap(), ExportFormat::Pdf);
}

#[test]
fn unknown_export_format_is_bad_request() {
    let err = parse_export_format(Some("docx")).unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.message, "Unsupported export format: docx");
}

#[test]
fn export_query_carries_filters() {
    let query: ExportQuery =
        query_from("format=pdf&name=arts&type=Federal&assignee=dana&date=2025-03-01");
    assert_eq!(query.format.as_deref(), Some("pdf"));
    assert_eq!(query.filter.name.as_deref(), Some("arts"));
    assert_eq!(query.filter.grant_type.as_deref(), Some("Federal"));
    assert_eq!(query.filter.assignee.as_deref(), Some("dana"));
    assert_eq!(query.filter.date.as_deref(), Some("2025-03-01"));
}

fn query_from<T: serde::de::DeserializeOwned>(raw: &str) -> T {
    let uri: axum::http::Uri = format!("/api/grants/export?{raw}").parse().unwrap();
    Query::<T>::try_from_uri(&uri).unwrap().0
}

#[cfg(feature = "live-db-tests")]
mod live {
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::services::role::Role;
    use crate::services::session;
    use crate::state::test_helpers::{live_pool, seed_user, test_config};
    use crate::state::AppState;

    async fn bearer(pool: &sqlx::PgPool, role: Role) -> String {
        let user_id = seed_user(pool, role).await;
        let token = session::create_session(pool, user_id, std::time::Duration::from_secs(600)).await.unwrap();
        format!("Bearer {token}")
    }

    fn app(pool: sqlx::PgPool) -> Router {
        crate::routes::app(AppState::new(pool, test_config(), None))
    }

    #[tokio::test]
    async fn plain_user_cannot_create_grants() {
        let pool = live_pool().await;
        let auth = bearer(&pool, Role::User).await;
        let req = Request::builder()
            .method("POST")
            .uri("/api/grants")
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"x","funding_agency":"y"}"#))
            .unwrap();
        let response = app(pool).oneshot(req).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn export_sets_attachment_headers() {
        let pool = live_pool().await;
        let auth = bearer(&pool, Role::User).await;
        let req = Request::builder()
            .uri("/api/grants/export?format=csv&name=zzz-no-match-zzz")
            .header(AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap();
        let response = app(pool).oneshot(req).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let disposition = response.headers()["content-disposition"].to_str().unwrap().to_owned();
        assert!(disposition.starts_with("attachment; filename=\"grants-"));
        assert!(disposition.ends_with(".csv\""));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Grant Name,Type,Amount,Date,Assignee,Status\n");
    }
}
