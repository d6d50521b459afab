//! Per-grant notes and outcome categorization.
//!
//! A details row is created lazily on first save; reading a grant that has
//! never been annotated returns empty defaults without writing anything.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use super::grant::GrantError;

/// Allowed values for [`GrantDetails::category`]. Empty means uncategorized.
pub const CATEGORIES: [&str; 7] = [
    "Relationship",
    "FHC too small for sponsor",
    "Lack of FHC social presence",
    "Persistent follow-up",
    "Alignment to cause",
    "Added to Budget in time",
    "Missed being added to budget",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantDetails {
    pub grant_id: i64,
    pub notes: String,
    pub category: String,
    pub reason_notes: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl GrantDetails {
    #[must_use]
    pub fn empty(grant_id: i64) -> Self {
        Self { grant_id, notes: String::new(), category: String::new(), reason_notes: String::new(), updated_at: None }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailsInput {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub reason_notes: String,
}

impl DetailsInput {
    /// # Errors
    ///
    /// [`GrantError::Validation`] for a category outside [`CATEGORIES`].
    pub fn validate(self) -> Result<Self, GrantError> {
        let category = self.category.trim().to_owned();
        if !category.is_empty() && !CATEGORIES.contains(&category.as_str()) {
            return Err(GrantError::Validation(format!("Unknown category: {category}")));
        }
        Ok(Self { notes: self.notes, category, reason_notes: self.reason_notes })
    }
}

/// Details for `grant_id`, or empty defaults if none were saved yet.
///
/// # Errors
///
/// [`GrantError::NotFound`] if the grant itself does not exist.
pub async fn get_details(pool: &PgPool, grant_id: i64) -> Result<GrantDetails, GrantError> {
    let row = sqlx::query_as::<_, (String, String, String, OffsetDateTime)>(
        "SELECT notes, category, reason_notes, updated_at FROM grant_details WHERE grant_id = $1",
    )
    .bind(grant_id)
    .fetch_optional(pool)
    .await?;

    if let Some((notes, category, reason_notes, updated_at)) = row {
        return Ok(GrantDetails { grant_id, notes, category, reason_notes, updated_at: Some(updated_at) });
    }

    ensure_grant_exists(pool, grant_id).await?;
    Ok(GrantDetails::empty(grant_id))
}

/// Create or replace the details for `grant_id`.
///
/// # Errors
///
/// [`GrantError::Validation`] for an unknown category,
/// [`GrantError::NotFound`] if the grant does not exist.
pub async fn save_details(pool: &PgPool, grant_id: i64, input: DetailsInput) -> Result<GrantDetails, GrantError> {
    let input = input.validate()?;
    ensure_grant_exists(pool, grant_id).await?;

    let updated_at: OffsetDateTime = sqlx::query_scalar(
        r"INSERT INTO grant_details (grant_id, notes, category, reason_notes)
          VALUES ($1, $2, $3, $4)
          ON CONFLICT (grant_id) DO UPDATE SET
              notes = EXCLUDED.notes,
              category = EXCLUDED.category,
              reason_notes = EXCLUDED.reason_notes,
              updated_at = now()
          RETURNING updated_at",
    )
    .bind(grant_id)
    .bind(&input.notes)
    .bind(&input.category)
    .bind(&input.reason_notes)
    .fetch_one(pool)
    .await?;

    tracing::info!(grant_id, category = %input.category, "grant details saved");
    Ok(GrantDetails {
        grant_id,
        notes: input.notes,
        category: input.category,
        reason_notes: input.reason_notes,
        updated_at: Some(updated_at),
    })
}

async fn ensure_grant_exists(pool: &PgPool, grant_id: i64) -> Result<(), GrantError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM grants WHERE grant_id = $1)")
        .bind(grant_id)
        .fetch_one(pool)
        .await?;
    if exists { Ok(()) } else { Err(GrantError::NotFound(grant_id)) }
}

#[cfg(test)]
#[path = "grant_details_test.rs"]
mod tests;
