//! Role management for administrators.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiError;
use super::guard::AdminUser;
use crate::services::role::{self, ProfileRow, Role, RoleError};
use crate::state::AppState;

/// `GET /api/admin/users` — every account with its role.
pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<ProfileRow>>, ApiError> {
    Ok(Json(role::list_profiles(&state.pool).await?))
}

#[derive(Deserialize)]
pub struct SetRoleBody {
    pub role: String,
}

/// `PUT /api/admin/users/{id}/role` — change a user's role.
pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(target): Path<Uuid>,
    Json(body): Json<SetRoleBody>,
) -> Result<StatusCode, ApiError> {
    let role = Role::parse(&body.role).ok_or_else(|| RoleError::UnknownRole(body.role.clone()))?;
    role::set_role(&state.pool, admin.user.id, target, role).await?;
    Ok(StatusCode::NO_CONTENT)
}
