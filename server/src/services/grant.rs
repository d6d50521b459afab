//! Grant records.
//!
//! DESIGN
//! ======
//! The `grants` table is the system of record. Reads return the full row
//! ([`Grant`]); the dashboard works on the narrower display shape
//! ([`GrantView`]), which is what filtering, summaries and exports consume.
//!
//! Writes are admin-only at the route layer. Every write goes through
//! [`GrantInput::validate`], which trims optional text to `None` and rejects
//! records the dashboard could not render sensibly.

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantStatus {
    Applied,
    Granted,
    #[serde(rename = "Not Granted")]
    NotGranted,
    #[default]
    #[serde(rename = "In Process")]
    InProcess,
}

impl GrantStatus {
    /// Fixed display order used by summaries and charts.
    pub const ALL: [Self; 4] = [Self::Applied, Self::Granted, Self::NotGranted, Self::InProcess];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::Granted => "Granted",
            Self::NotGranted => "Not Granted",
            Self::InProcess => "In Process",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl std::fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full grant row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grant {
    pub grant_id: i64,
    pub title: String,
    pub funding_agency: String,
    pub amount: Option<f64>,
    pub deadline: Option<Date>,
    pub assignee: Option<String>,
    pub grant_type: Option<String>,
    pub status: GrantStatus,
    pub is_active: bool,
    pub description: Option<String>,
    pub eligibility_criteria: Option<String>,
    pub application_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub crawled_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

/// Dashboard row: the columns shown in the table, filtered and exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrantView {
    pub id: i64,
    pub name: String,
    pub agency: String,
    pub amount: Option<f64>,
    pub date: Option<Date>,
    #[serde(rename = "type")]
    pub grant_type: Option<String>,
    pub assignee: Option<String>,
    pub status: GrantStatus,
    pub is_active: bool,
}

impl From<Grant> for GrantView {
    fn from(grant: Grant) -> Self {
        Self {
            id: grant.grant_id,
            name: grant.title,
            agency: grant.funding_agency,
            amount: grant.amount,
            date: grant.deadline,
            grant_type: grant.grant_type,
            assignee: grant.assignee,
            status: grant.status,
            is_active: grant.is_active,
        }
    }
}

/// Create/update payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GrantInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub funding_agency: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_deadline")]
    pub deadline: Option<Date>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default, alias = "type")]
    pub grant_type: Option<String>,
    #[serde(default)]
    pub status: GrantStatus,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub eligibility_criteria: Option<String>,
    #[serde(default)]
    pub application_url: Option<String>,
}

fn default_active() -> bool {
    true
}

/// One bulk-import record. An explicit `grant_id` updates that row in place.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRecord {
    #[serde(default)]
    pub grant_id: Option<i64>,
    #[serde(flatten)]
    pub grant: GrantInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("{0}")]
    Validation(String),
    #[error("grant not found: {0}")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// INPUT VALIDATION
// =============================================================================

/// Accepts `YYYY-MM-DD`, or a longer ISO timestamp whose first ten
/// characters are a date. Blank means no deadline.
fn deserialize_deadline<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_date(s).map_err(serde::de::Error::custom))
        .transpose()
}

pub(crate) fn parse_date(raw: &str) -> Result<Date, String> {
    let head = raw.get(..10).unwrap_or(raw);
    Date::parse(head, format_description!("[year]-[month]-[day]")).map_err(|e| format!("invalid date {raw:?}: {e}"))
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

impl GrantInput {
    /// Trim text fields and check the record is storable.
    ///
    /// # Errors
    ///
    /// [`GrantError::Validation`] naming the first offending field.
    pub fn validate(self) -> Result<Self, GrantError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(GrantError::Validation("Grant name is required.".into()));
        }
        let funding_agency = self.funding_agency.trim().to_owned();
        if funding_agency.is_empty() {
            return Err(GrantError::Validation("Funding agency is required.".into()));
        }
        if let Some(amount) = self.amount
            && (!amount.is_finite() || amount < 0.0)
        {
            return Err(GrantError::Validation("Amount must be a non-negative number.".into()));
        }
        let application_url = clean(self.application_url);
        if let Some(url) = &application_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(GrantError::Validation("Application URL must start with http:// or https://.".into()));
        }

        Ok(Self {
            title,
            funding_agency,
            amount: self.amount,
            deadline: self.deadline,
            assignee: clean(self.assignee),
            grant_type: clean(self.grant_type),
            status: self.status,
            is_active: self.is_active,
            description: clean(self.description),
            eligibility_criteria: clean(self.eligibility_criteria),
            application_url,
        })
    }
}

// =============================================================================
// QUERIES
// =============================================================================

const GRANT_COLUMNS: &str = "grant_id, title, funding_agency, amount, deadline, assignee, grant_type, status, \
                             is_active, description, eligibility_criteria, application_url, crawled_date, last_updated";

fn grant_from_row(row: &PgRow) -> Grant {
    let grant_id: i64 = row.get("grant_id");
    let raw_status: String = row.get("status");
    let status = GrantStatus::parse(&raw_status).unwrap_or_else(|| {
        tracing::warn!(grant_id, status = %raw_status, "unknown grant status; treating as in process");
        GrantStatus::InProcess
    });
    Grant {
        grant_id,
        title: row.get("title"),
        funding_agency: row.get("funding_agency"),
        amount: row.get("amount"),
        deadline: row.get("deadline"),
        assignee: row.get("assignee"),
        grant_type: row.get("grant_type"),
        status,
        is_active: row.get("is_active"),
        description: row.get("description"),
        eligibility_criteria: row.get("eligibility_criteria"),
        application_url: row.get("application_url"),
        crawled_date: row.get("crawled_date"),
        last_updated: row.get("last_updated"),
    }
}

/// All grants, soonest deadline first; undated grants last.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_grants(pool: &PgPool) -> Result<Vec<Grant>, GrantError> {
    let sql = format!("SELECT {GRANT_COLUMNS} FROM grants ORDER BY deadline ASC NULLS LAST, grant_id ASC");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(grant_from_row).collect())
}

/// Dashboard rows for every grant, in list order.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_views(pool: &PgPool) -> Result<Vec<GrantView>, GrantError> {
    Ok(list_grants(pool).await?.into_iter().map(GrantView::from).collect())
}

/// # Errors
///
/// [`GrantError::NotFound`] if no grant has this id.
pub async fn get_grant(pool: &PgPool, grant_id: i64) -> Result<Grant, GrantError> {
    let sql = format!("SELECT {GRANT_COLUMNS} FROM grants WHERE grant_id = $1");
    let row = sqlx::query(&sql)
        .bind(grant_id)
        .fetch_optional(pool)
        .await?
        .ok_or(GrantError::NotFound(grant_id))?;
    Ok(grant_from_row(&row))
}

/// # Errors
///
/// [`GrantError::Validation`] for a rejected input.
pub async fn create_grant(pool: &PgPool, input: GrantInput) -> Result<Grant, GrantError> {
    let input = input.validate()?;
    let sql = format!(
        r"INSERT INTO grants (title, funding_agency, amount, deadline, assignee, grant_type, status,
                              is_active, description, eligibility_criteria, application_url)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
          RETURNING {GRANT_COLUMNS}"
    );
    let row = bind_input(sqlx::query(&sql), &input).fetch_one(pool).await?;
    let grant = grant_from_row(&row);
    tracing::info!(grant_id = grant.grant_id, "grant created");
    Ok(grant)
}

/// Replace every editable field of `grant_id` and bump `last_updated`.
///
/// # Errors
///
/// [`GrantError::Validation`] for a rejected input, [`GrantError::NotFound`]
/// if the grant does not exist.
pub async fn update_grant(pool: &PgPool, grant_id: i64, input: GrantInput) -> Result<Grant, GrantError> {
    let input = input.validate()?;
    let sql = format!(
        r"UPDATE grants
          SET title = $1, funding_agency = $2, amount = $3, deadline = $4, assignee = $5,
              grant_type = $6, status = $7, is_active = $8, description = $9,
              eligibility_criteria = $10, application_url = $11, last_updated = now()
          WHERE grant_id = $12
          RETURNING {GRANT_COLUMNS}"
    );
    let row = bind_input(sqlx::query(&sql), &input)
        .bind(grant_id)
        .fetch_optional(pool)
        .await?
        .ok_or(GrantError::NotFound(grant_id))?;
    tracing::info!(grant_id, "grant updated");
    Ok(grant_from_row(&row))
}

/// # Errors
///
/// [`GrantError::NotFound`] if the grant does not exist.
pub async fn delete_grant(pool: &PgPool, grant_id: i64) -> Result<(), GrantError> {
    let result = sqlx::query("DELETE FROM grants WHERE grant_id = $1")
        .bind(grant_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(GrantError::NotFound(grant_id));
    }
    tracing::info!(grant_id, "grant deleted");
    Ok(())
}

/// Bulk upsert. Records that fail to parse or validate are skipped.
///
/// Runs in one transaction; afterwards the id sequence is moved past the
/// largest id so later inserts do not collide with imported ids.
///
/// # Errors
///
/// Returns a database error if any write fails; nothing is committed then.
pub async fn import_grants(pool: &PgPool, records: Vec<serde_json::Value>) -> Result<ImportSummary, GrantError> {
    let mut valid = Vec::with_capacity(records.len());
    let mut skipped = 0_usize;
    for value in records {
        match parse_import_record(value) {
            Ok(record) => valid.push(record),
            Err(reason) => {
                tracing::debug!(%reason, "skipping import record");
                skipped = skipped.saturating_add(1);
            }
        }
    }

    if valid.is_empty() {
        return Ok(ImportSummary { imported: 0, skipped });
    }

    let sql = r"INSERT INTO grants (title, funding_agency, amount, deadline, assignee, grant_type, status,
                                    is_active, description, eligibility_criteria, application_url, grant_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, nextval(pg_get_serial_sequence('grants', 'grant_id'))))
                ON CONFLICT (grant_id) DO UPDATE SET
                    title = EXCLUDED.title,
                    funding_agency = EXCLUDED.funding_agency,
                    amount = EXCLUDED.amount,
                    deadline = EXCLUDED.deadline,
                    assignee = EXCLUDED.assignee,
                    grant_type = EXCLUDED.grant_type,
                    status = EXCLUDED.status,
                    is_active = EXCLUDED.is_active,
                    description = EXCLUDED.description,
                    eligibility_criteria = EXCLUDED.eligibility_criteria,
                    application_url = EXCLUDED.application_url,
                    last_updated = now()";

    let mut tx = pool.begin().await?;
    for record in &valid {
        bind_input(sqlx::query(sql), &record.grant)
            .bind(record.grant_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query(
        "SELECT setval(pg_get_serial_sequence('grants', 'grant_id'), (SELECT COALESCE(MAX(grant_id), 0) + 1 FROM grants), false)",
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(imported = valid.len(), skipped, "grants imported");
    Ok(ImportSummary { imported: valid.len(), skipped })
}

pub(crate) fn parse_import_record(value: serde_json::Value) -> Result<ImportRecord, String> {
    let record: ImportRecord = serde_json::from_value(value).map_err(|e| e.to_string())?;
    let grant = record.grant.validate().map_err(|e| e.to_string())?;
    Ok(ImportRecord { grant_id: record.grant_id, grant })
}

fn bind_input<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    input: &'q GrantInput,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(&input.title)
        .bind(&input.funding_agency)
        .bind(input.amount)
        .bind(input.deadline)
        .bind(&input.assignee)
        .bind(&input.grant_type)
        .bind(input.status.as_str())
        .bind(input.is_active)
        .bind(&input.description)
        .bind(&input.eligibility_criteria)
        .bind(&input.application_url)
}

#[cfg(test)]
#[path = "grant_test.rs"]
mod tests;
