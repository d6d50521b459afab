//! Dashboard header figures and the status chart.

use serde::Serialize;

use super::filter::total_amount;
use super::grant::{GrantStatus, GrantView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: GrantStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrantSummary {
    pub count: usize,
    pub total_amount: f64,
    /// Always the four statuses in [`GrantStatus::ALL`] order, zeros included.
    pub by_status: Vec<StatusCount>,
}

#[must_use]
pub fn summarize(grants: &[GrantView]) -> GrantSummary {
    let by_status = GrantStatus::ALL
        .into_iter()
        .map(|status| StatusCount { status, count: grants.iter().filter(|g| g.status == status).count() })
        .collect();
    GrantSummary { count: grants.len(), total_amount: total_amount(grants), by_status }
}

#[cfg(test)]
#[path = "summary_test.rs"]
mod tests;
