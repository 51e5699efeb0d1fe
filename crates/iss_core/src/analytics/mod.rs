//! Dashboard figures and activity feed. Every figure is computed per call from the store.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::domain::{Alternative, Priority, Ticket, TicketStatus};
use crate::error::AppError;
use crate::estimate::{EtaHistory, RootCauseHints};
use crate::normalize::timestamps::elapsed_seconds;
use crate::repo::{alternatives_by_service, ticket_from_row, TICKET_COLUMNS, TICKET_COLUMN_COUNT};

pub const TOP_AFFECTED_SERVICES: i64 = 5;
pub const ACTIVITY_FEED_LEN: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceTicketCount {
    pub name: String,
    pub ticket_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_open: i64,
    pub avg_resolution_hours: f64,
    pub critical_tickets: i64,
    pub affected_services: Vec<ServiceTicketCount>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Created,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub incident_id: String,
    pub time: String,
}

/// An unresolved ticket as shown in the impact center.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveImpact {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub service_name: String,
    pub service_category: String,
    pub root_cause_display: String,
    pub eta_display: String,
    pub alternatives: Vec<Alternative>,
}

pub fn count_open_tickets(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row(
        "SELECT COUNT(*) FROM tickets WHERE status != ?1",
        [TicketStatus::Resolved],
        |row| row.get(0),
    )
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to count open tickets")
            .with_details(e.to_string())
    })
}

pub fn count_open_critical_tickets(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row(
        "SELECT COUNT(*) FROM tickets WHERE priority = ?1 AND status != ?2",
        params![Priority::Critical, TicketStatus::Resolved],
        |row| row.get(0),
    )
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to count critical tickets")
            .with_details(e.to_string())
    })
}

fn round_one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Mean resolution time in hours over all resolved tickets, rounded to one decimal; `0.0` when
/// nothing has been resolved yet.
pub fn average_resolution_hours(conn: &Connection) -> Result<f64, AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT created_at, resolved_at FROM tickets WHERE status = ?1 AND resolved_at IS NOT NULL",
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare resolution time query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map([TicketStatus::Resolved], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query resolution times")
                .with_details(e.to_string())
        })?;

    let mut total_seconds: i64 = 0;
    let mut samples: i64 = 0;
    for r in rows {
        let (created_at, resolved_at) = r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode resolution time row")
                .with_details(e.to_string())
        })?;
        match elapsed_seconds(&created_at, &resolved_at) {
            Some(secs) => {
                total_seconds += secs;
                samples += 1;
            }
            None => tracing::warn!(
                created_at = created_at.as_str(),
                resolved_at = resolved_at.as_str(),
                "excluding resolved ticket with unusable timestamps from average"
            ),
        }
    }

    if samples == 0 {
        return Ok(0.0);
    }
    Ok(round_one_decimal(
        total_seconds as f64 / samples as f64 / 3600.0,
    ))
}

/// Services with the most unresolved tickets, busiest first (ties by name).
pub fn top_affected_services(
    conn: &Connection,
    limit: i64,
) -> Result<Vec<ServiceTicketCount>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
      SELECT s.name, COUNT(t.id) AS ticket_count
      FROM tickets t
      JOIN services s ON t.service_id = s.id
      WHERE t.status != ?1
      GROUP BY s.id, s.name
      ORDER BY ticket_count DESC, s.name ASC
      LIMIT ?2
      "#,
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare affected services query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map(params![TicketStatus::Resolved, limit], |row| {
            Ok(ServiceTicketCount {
                name: row.get(0)?,
                ticket_count: row.get(1)?,
            })
        })
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query affected services")
                .with_details(e.to_string())
        })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode affected service row")
                .with_details(e.to_string())
        })?);
    }
    Ok(out)
}

pub fn build_dashboard_stats(conn: &Connection) -> Result<DashboardStats, AppError> {
    Ok(DashboardStats {
        total_open: count_open_tickets(conn)?,
        avg_resolution_hours: average_resolution_hours(conn)?,
        critical_tickets: count_open_critical_tickets(conn)?,
        affected_services: top_affected_services(conn, TOP_AFFECTED_SERVICES)?,
    })
}

/// The most recently created tickets as "created" activity entries, newest first.
pub fn recent_activity(conn: &Connection, limit: i64) -> Result<Vec<ActivityEntry>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
      SELECT title, incident_id, created_at
      FROM tickets
      ORDER BY created_at DESC, id DESC
      LIMIT ?1
      "#,
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare activity query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map([limit], |row| {
            Ok(ActivityEntry {
                kind: ActivityKind::Created,
                title: row.get(0)?,
                incident_id: row.get(1)?,
                time: row.get(2)?,
            })
        })
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query activity")
                .with_details(e.to_string())
        })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode activity row")
                .with_details(e.to_string())
        })?);
    }
    Ok(out)
}

/// Unresolved tickets ranked by impact score (highest first, ties by id), each enriched with
/// its service, display root cause, ETA and the service's workarounds.
pub fn list_active_impacts(
    conn: &Connection,
    hints: &RootCauseHints,
) -> Result<Vec<ActiveImpact>, AppError> {
    let mut stmt = conn
        .prepare(&format!(
            r#"
      SELECT {TICKET_COLUMNS}, s.name, s.category
      FROM tickets t
      JOIN services s ON t.service_id = s.id
      WHERE t.status != ?1
      ORDER BY t.impact_score DESC, t.id ASC
      "#
        ))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare active impacts query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map([TicketStatus::Resolved], |row| {
            Ok((
                ticket_from_row(row)?,
                row.get::<_, String>(TICKET_COLUMN_COUNT)?,
                row.get::<_, String>(TICKET_COLUMN_COUNT + 1)?,
            ))
        })
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query active impacts")
                .with_details(e.to_string())
        })?;

    let mut active = Vec::new();
    for r in rows {
        active.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode active impact row")
                .with_details(e.to_string())
        })?);
    }
    if active.is_empty() {
        return Ok(Vec::new());
    }

    let history = EtaHistory::load(conn)?;
    let alternatives = alternatives_by_service(conn)?;

    Ok(active
        .into_iter()
        .map(|(ticket, service_name, service_category)| {
            let eta_display = history.eta_for(
                ticket.service_id,
                ticket.priority,
                ticket.eta_override.as_deref(),
            );
            let root_cause_display =
                hints.display(ticket.root_cause.as_deref(), &service_category);
            let alts = alternatives
                .get(&ticket.service_id)
                .cloned()
                .unwrap_or_default();
            ActiveImpact {
                ticket,
                service_name,
                service_category,
                root_cause_display,
                eta_display,
                alternatives: alts,
            }
        })
        .collect())
}
