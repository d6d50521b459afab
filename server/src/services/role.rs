//! Roles and the profile table.
//!
//! Every account has exactly one `profiles` row holding its role. The role
//! is looked up after each sign-in and on every authenticated request; a
//! missing row or an unrecognized role string is a lookup failure, never a
//! silent downgrade to `user`.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Parse a stored or submitted role name, ignoring case and surrounding
    /// whitespace.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("no profile for user {0}")]
    ProfileMissing(Uuid),
    #[error("unrecognized role {0:?}")]
    UnknownRole(String),
    #[error("user not found: {0}")]
    UserNotFound(Uuid),
    #[error("administrators cannot remove their own admin role")]
    SelfDemotion,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Row shown on the role-management screen.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

/// Look up the role for `user_id` from the profile table.
///
/// # Errors
///
/// [`RoleError::ProfileMissing`] if no profile exists,
/// [`RoleError::UnknownRole`] if the stored value is not a known role.
pub async fn fetch_role(pool: &PgPool, user_id: Uuid) -> Result<Role, RoleError> {
    let raw: Option<String> = sqlx::query_scalar("SELECT role FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    let raw = raw.ok_or(RoleError::ProfileMissing(user_id))?;
    Role::parse(&raw).ok_or(RoleError::UnknownRole(raw))
}

/// List every account with its role, admins first.
///
/// Profiles holding an unrecognized role are skipped with a warning.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_profiles(pool: &PgPool) -> Result<Vec<ProfileRow>, RoleError> {
    let rows = sqlx::query(
        r"SELECT u.id, u.email, p.display_name, p.role
          FROM users u
          JOIN profiles p ON p.user_id = u.id
          ORDER BY (p.role = 'admin') DESC, u.email ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let user_id: Uuid = r.get("id");
            let raw: String = r.get("role");
            let Some(role) = Role::parse(&raw) else {
                tracing::warn!(%user_id, role = %raw, "skipping profile with unknown role");
                return None;
            };
            Some(ProfileRow { user_id, email: r.get("email"), display_name: r.get("display_name"), role })
        })
        .collect())
}

/// Change the role of `target`. `actor` is the admin making the change.
///
/// # Errors
///
/// [`RoleError::SelfDemotion`] if an admin tries to demote themself,
/// [`RoleError::UserNotFound`] if `target` has no profile.
pub async fn set_role(pool: &PgPool, actor: Uuid, target: Uuid, role: Role) -> Result<(), RoleError> {
    ensure_not_self_demotion(actor, target, role)?;

    let result = sqlx::query("UPDATE profiles SET role = $2, updated_at = now() WHERE user_id = $1")
        .bind(target)
        .bind(role.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RoleError::UserNotFound(target));
    }
    tracing::info!(%actor, %target, role = %role, "role updated");
    Ok(())
}

pub(crate) fn ensure_not_self_demotion(actor: Uuid, target: Uuid, role: Role) -> Result<(), RoleError> {
    if actor == target && role != Role::Admin {
        return Err(RoleError::SelfDemotion);
    }
    Ok(())
}

#[cfg(test)]
#[path = "role_test.rs"]
mod tests;
