//! Grant routes: dashboard list, summary, export, CRUD and notes.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::ApiError;
use super::guard::{AdminUser, AuthUser};
use crate::services::export::{self, ExportFormat};
use crate::services::filter::{self, GrantFilter, GrantFilterQuery};
use crate::services::grant::{self, Grant, GrantInput, GrantView, ImportSummary};
use crate::services::grant_details::{self, DetailsInput, GrantDetails};
use crate::services::summary::{self, GrantSummary};
use crate::state::AppState;

#[derive(Serialize)]
pub struct GrantListResponse {
    pub grants: Vec<GrantView>,
    pub total_amount: f64,
}

async fn filtered_views(state: &AppState, query: GrantFilterQuery) -> Result<Vec<GrantView>, ApiError> {
    let filter = GrantFilter::try_from(query)?;
    let views = grant::list_views(&state.pool).await?;
    Ok(if filter.is_empty() { views } else { filter.apply(&views) })
}

/// `GET /api/grants` — dashboard rows matching the query filters.
pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<GrantFilterQuery>,
) -> Result<Json<GrantListResponse>, ApiError> {
    let grants = filtered_views(&state, query).await?;
    let total_amount = filter::total_amount(&grants);
    Ok(Json(GrantListResponse { grants, total_amount }))
}

/// `GET /api/grants/summary` — counts and totals for the filtered rows.
pub async fn summary(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<GrantFilterQuery>,
) -> Result<Json<GrantSummary>, ApiError> {
    let grants = filtered_views(&state, query).await?;
    Ok(Json(summary::summarize(&grants)))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(flatten)]
    pub filter: GrantFilterQuery,
}

pub(crate) fn parse_export_format(raw: Option<&str>) -> Result<ExportFormat, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(ExportFormat::Csv),
        Some(raw) => ExportFormat::parse(raw).ok_or_else(|| ApiError::bad_request(format!("Unsupported export format: {raw}"))),
    }
}

/// `GET /api/grants/export?format=csv|xlsx|pdf` — download the filtered rows.
pub async fn export_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = parse_export_format(query.format.as_deref())?;
    let grants = filtered_views(&state, query.filter).await?;
    let bytes = export::render(format, &grants)?;
    let filename = export::export_filename(format, OffsetDateTime::now_utc().date());
    tracing::info!(user_id = %auth.user.id, rows = grants.len(), format = format.extension(), "grants exported");

    Ok((
        [
            (CONTENT_TYPE, format.content_type().to_owned()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}

/// `GET /api/grants/{id}` — full grant record.
pub async fn get_one(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(grant_id): Path<i64>,
) -> Result<Json<Grant>, ApiError> {
    Ok(Json(grant::get_grant(&state.pool, grant_id).await?))
}

/// `POST /api/grants` — create a grant.
pub async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<GrantInput>,
) -> Result<(StatusCode, Json<Grant>), ApiError> {
    let grant = grant::create_grant(&state.pool, input).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// `PUT /api/grants/{id}` — replace a grant's editable fields.
pub async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(grant_id): Path<i64>,
    Json(input): Json<GrantInput>,
) -> Result<Json<Grant>, ApiError> {
    Ok(Json(grant::update_grant(&state.pool, grant_id, input).await?))
}

/// `DELETE /api/grants/{id}` — delete a grant and its notes.
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(grant_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    grant::delete_grant(&state.pool, grant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ImportBody {
    pub grants: Vec<serde_json::Value>,
}

/// `POST /api/grants/import` — bulk upsert; bad records are skipped.
pub async fn import(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<ImportBody>,
) -> Result<Json<ImportSummary>, ApiError> {
    Ok(Json(grant::import_grants(&state.pool, body.grants).await?))
}

/// `GET /api/grants/{id}/details` — notes, or empty defaults.
pub async fn get_details(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(grant_id): Path<i64>,
) -> Result<Json<GrantDetails>, ApiError> {
    Ok(Json(grant_details::get_details(&state.pool, grant_id).await?))
}

/// `PUT /api/grants/{id}/details` — create or replace notes.
pub async fn save_details(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(grant_id): Path<i64>,
    Json(input): Json<DetailsInput>,
) -> Result<Json<GrantDetails>, ApiError> {
    let details = grant_details::save_details(&state.pool, grant_id, input).await?;
    tracing::debug!(user_id = %auth.user.id, grant_id, "details saved by user");
    Ok(Json(details))
}

#[cfg(test)]
#[path = "grants_test.rs"]
mod tests;
