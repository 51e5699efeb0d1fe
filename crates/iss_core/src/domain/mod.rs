use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Lifecycle state of a ticket.
///
/// Stored and serialized as the human-readable label (`"In Progress"`, not `InProgress`).
/// `Resolved` is terminal and is only reachable through `repo::resolve_ticket`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TicketStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Diagnosing,
    Resolved,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Diagnosing,
        TicketStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Diagnosing => "Diagnosing",
            TicketStatus::Resolved => "Resolved",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, TicketStatus::Resolved)
    }
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

fn parse_label<T: Copy>(
    raw: &str,
    all: &[T],
    label: impl Fn(&T) -> &'static str,
    code: &str,
    what: &str,
) -> Result<T, AppError> {
    let trimmed = raw.trim();
    all.iter()
        .find(|v| label(v).eq_ignore_ascii_case(trimmed))
        .copied()
        .ok_or_else(|| {
            let allowed = all.iter().map(|v| label(v)).collect::<Vec<_>>().join(", ");
            AppError::new(code, format!("Unrecognized {what}: {trimmed}"))
                .with_details(format!("allowed={allowed}"))
        })
}

impl FromStr for TicketStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(
            s,
            &TicketStatus::ALL,
            TicketStatus::as_str,
            "VALIDATION_UNKNOWN_STATUS",
            "ticket status",
        )
    }
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(
            s,
            &Priority::ALL,
            Priority::as_str,
            "VALIDATION_UNKNOWN_PRIORITY",
            "priority",
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TicketStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TicketStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub criticality_score: i64,
    pub user_count_estimate: i64,
}

/// A recorded incident against one service.
///
/// Notes:
/// - Timestamps are canonical RFC3339 UTC strings with whole-second precision.
/// - `resolved_at`, `root_cause` and `root_cause_category` stay `None` until the ticket is resolved.
/// - `eta_override` is a free-text manual estimate that wins over computed ETAs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: i64,
    pub incident_id: String,
    pub title: String,
    pub description: String,
    pub service_id: i64,
    pub status: TicketStatus,
    pub priority: Priority,
    pub impact_score: i64,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub root_cause: Option<String>,
    pub root_cause_category: Option<String>,
    pub eta_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alternative {
    pub id: i64,
    pub service_id: i64,
    pub issue_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewService {
    pub name: String,
    pub category: String,
    pub criticality_score: i64,
    pub user_count_estimate: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub service_id: i64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAlternative {
    pub service_id: i64,
    pub issue_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveTicket {
    pub root_cause: String,
    pub root_cause_category: Option<String>,
}
