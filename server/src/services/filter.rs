//! Dashboard filtering.
//!
//! Filtering is a pure function of (grant list, criteria): the result is the
//! order-preserving subset of grants matching every active criterion. A
//! criterion left empty is inactive.

use serde::Deserialize;
use time::Date;

use super::grant::{self, GrantError, GrantView};

/// Raw criteria as they arrive in a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrantFilterQuery {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "type")]
    pub grant_type: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantFilter {
    pub name: Option<String>,
    pub date: Option<Date>,
    pub grant_type: Option<String>,
    pub assignee: Option<String>,
}

fn active(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<GrantFilterQuery> for GrantFilter {
    type Error = GrantError;

    fn try_from(query: GrantFilterQuery) -> Result<Self, Self::Error> {
        let date = active(query.date)
            .map(|raw| grant::parse_date(raw.trim()).map_err(GrantError::Validation))
            .transpose()?;
        Ok(Self {
            name: active(query.name).map(|v| v.trim().to_lowercase()),
            date,
            grant_type: active(query.grant_type),
            assignee: active(query.assignee).map(|v| v.trim().to_lowercase()),
        })
    }
}

impl GrantFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Whether `grant` satisfies every active criterion.
    ///
    /// Name and assignee are case-insensitive substring matches; date and
    /// type must be equal. A grant missing a filtered field never matches.
    #[must_use]
    pub fn matches(&self, grant: &GrantView) -> bool {
        if let Some(name) = &self.name
            && !grant.name.to_lowercase().contains(name.as_str())
        {
            return false;
        }
        if let Some(date) = self.date
            && grant.date != Some(date)
        {
            return false;
        }
        if let Some(grant_type) = &self.grant_type
            && grant.grant_type.as_deref() != Some(grant_type.as_str())
        {
            return false;
        }
        if let Some(assignee) = &self.assignee
            && !grant
                .assignee
                .as_deref()
                .is_some_and(|a| a.to_lowercase().contains(assignee.as_str()))
        {
            return false;
        }
        true
    }

    #[must_use]
    pub fn apply(&self, grants: &[GrantView]) -> Vec<GrantView> {
        grants.iter().filter(|g| self.matches(g)).cloned().collect()
    }
}

/// Sum of amounts; a grant without an amount contributes zero.
#[must_use]
pub fn total_amount(grants: &[GrantView]) -> f64 {
    grants.iter().filter_map(|g| g.amount).sum()
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
