use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{
    Alternative, NewAlternative, NewService, NewTicket, ResolveTicket, Service, Ticket,
    TicketStatus,
};
use crate::error::AppError;
use crate::estimate::{estimate_eta, impact_score, RootCauseHints};
use crate::normalize::timestamps::{canonical_utc, parse_rfc3339};
use crate::validate::{validate_new_service, validate_resolution};

/// Column list matching `ticket_from_row`; callers alias the tickets table as `t`.
pub(crate) const TICKET_COLUMNS: &str = "t.id, t.incident_id, t.title, t.description, t.service_id, \
     t.status, t.priority, t.impact_score, t.created_at, t.resolved_at, t.root_cause, \
     t.root_cause_category, t.eta_override";

/// Number of columns in `TICKET_COLUMNS`; extra selected columns start at this index.
pub(crate) const TICKET_COLUMN_COUNT: usize = 13;

pub(crate) fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        incident_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        service_id: row.get(4)?,
        status: row.get(5)?,
        priority: row.get(6)?,
        impact_score: row.get(7)?,
        created_at: row.get(8)?,
        resolved_at: row.get(9)?,
        root_cause: row.get(10)?,
        root_cause_category: row.get(11)?,
        eta_override: row.get(12)?,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketListItem {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub service_name: String,
    pub service_category: String,
    pub criticality_score: i64,
    pub user_count_estimate: i64,
    pub root_cause_display: String,
    pub eta_display: String,
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub limit: Option<u32>,
}

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        criticality_score: row.get(3)?,
        user_count_estimate: row.get(4)?,
    })
}

pub fn list_services(conn: &Connection) -> Result<Vec<Service>, AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, category, criticality_score, user_count_estimate FROM services ORDER BY name ASC, id ASC",
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare services query")
                .with_details(e.to_string())
        })?;

    let rows = stmt.query_map([], service_from_row).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query services").with_details(e.to_string())
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode service row")
                .with_details(e.to_string())
        })?);
    }
    Ok(out)
}

pub fn get_service(conn: &Connection, id: i64) -> Result<Service, AppError> {
    conn.query_row(
        "SELECT id, name, category, criticality_score, user_count_estimate FROM services WHERE id = ?1",
        [id],
        service_from_row,
    )
    .optional()
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query service").with_details(e.to_string())
    })?
    .ok_or_else(|| {
        AppError::new("SERVICE_NOT_FOUND", "Service not found").with_details(format!("id={id}"))
    })
}

pub fn create_service(conn: &Connection, service: &NewService) -> Result<Service, AppError> {
    validate_new_service(service)?;
    let name = service.name.trim();
    let category = service.category.trim();

    let existing: Option<i64> = conn
        .query_row("SELECT id FROM services WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to check service name")
                .with_details(e.to_string())
        })?;
    if let Some(id) = existing {
        return Err(AppError::new(
            "SERVICE_NAME_CONFLICT",
            "A service with this name already exists",
        )
        .with_details(format!("name={name}; id={id}")));
    }

    conn.execute(
        "INSERT INTO services (name, category, criticality_score, user_count_estimate) VALUES (?1, ?2, ?3, ?4)",
        params![
            name,
            category,
            service.criticality_score,
            service.user_count_estimate
        ],
    )
    .map_err(|e| {
        AppError::new("DB_INSERT_FAILED", "Failed to insert service").with_details(e.to_string())
    })?;

    let id = conn.last_insert_rowid();
    tracing::info!(service_id = id, name, "service registered");
    get_service(conn, id)
}

pub fn insert_alternative(
    conn: &Connection,
    alternative: &NewAlternative,
) -> Result<Alternative, AppError> {
    get_service(conn, alternative.service_id)?;

    conn.execute(
        "INSERT INTO alternatives (service_id, issue_type, description) VALUES (?1, ?2, ?3)",
        params![
            alternative.service_id,
            alternative.issue_type.trim(),
            alternative.description.trim()
        ],
    )
    .map_err(|e| {
        AppError::new("DB_INSERT_FAILED", "Failed to insert alternative")
            .with_details(e.to_string())
    })?;

    Ok(Alternative {
        id: conn.last_insert_rowid(),
        service_id: alternative.service_id,
        issue_type: alternative.issue_type.trim().to_string(),
        description: alternative.description.trim().to_string(),
    })
}

fn alternative_from_row(row: &Row<'_>) -> rusqlite::Result<Alternative> {
    Ok(Alternative {
        id: row.get(0)?,
        service_id: row.get(1)?,
        issue_type: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn list_alternatives_for_service(
    conn: &Connection,
    service_id: i64,
) -> Result<Vec<Alternative>, AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, service_id, issue_type, description FROM alternatives WHERE service_id = ?1 ORDER BY id ASC",
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare alternatives query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map([service_id], alternative_from_row)
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query alternatives")
                .with_details(e.to_string())
        })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode alternative row")
                .with_details(e.to_string())
        })?);
    }
    Ok(out)
}

/// All alternatives grouped by service id, in insertion order within each service.
pub fn alternatives_by_service(
    conn: &Connection,
) -> Result<BTreeMap<i64, Vec<Alternative>>, AppError> {
    let mut stmt = conn
        .prepare("SELECT id, service_id, issue_type, description FROM alternatives ORDER BY id ASC")
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare alternatives query")
                .with_details(e.to_string())
        })?;

    let rows = stmt.query_map([], alternative_from_row).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query alternatives")
            .with_details(e.to_string())
    })?;

    let mut out: BTreeMap<i64, Vec<Alternative>> = BTreeMap::new();
    for r in rows {
        let alt = r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode alternative row")
                .with_details(e.to_string())
        })?;
        out.entry(alt.service_id).or_default().push(alt);
    }
    Ok(out)
}

pub fn count_tickets(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to count tickets").with_details(e.to_string())
        })
}

pub fn get_ticket(conn: &Connection, id: i64) -> Result<Ticket, AppError> {
    conn.query_row(
        &format!("SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.id = ?1"),
        [id],
        ticket_from_row,
    )
    .optional()
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query ticket").with_details(e.to_string())
    })?
    .ok_or_else(|| {
        AppError::new("TICKET_NOT_FOUND", "Ticket not found").with_details(format!("id={id}"))
    })
}

/// Tickets joined with their service name, newest first.
pub fn list_tickets(conn: &Connection, filter: &TicketFilter) -> Result<Vec<TicketListItem>, AppError> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit: i64 = filter.limit.map(i64::from).unwrap_or(-1);

    let mut stmt = conn
        .prepare(&format!(
            r#"
      SELECT {TICKET_COLUMNS}, s.name
      FROM tickets t
      JOIN services s ON t.service_id = s.id
      WHERE (?1 IS NULL OR t.status = ?1)
      ORDER BY t.created_at DESC, t.id DESC
      LIMIT ?2
      "#
        ))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare tickets query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map(params![filter.status, limit], |row| {
            Ok(TicketListItem {
                ticket: ticket_from_row(row)?,
                service_name: row.get(TICKET_COLUMN_COUNT)?,
            })
        })
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query tickets").with_details(e.to_string())
        })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode ticket row")
                .with_details(e.to_string())
        })?);
    }
    Ok(out)
}

fn incident_id_taken(conn: &Connection, incident_id: &str) -> Result<bool, AppError> {
    conn.query_row(
        "SELECT 1 FROM tickets WHERE incident_id = ?1",
        [incident_id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to check incident id")
            .with_details(e.to_string())
    })
}

/// Create a ticket against an existing service.
///
/// The impact score is computed from the service at creation time and the ticket starts `Open`.
/// The external id is `INC-<unix millis>`; if that id is taken the millisecond value is bumped
/// until a free one is found. Nothing is written when the service does not exist.
pub fn create_ticket(
    conn: &mut Connection,
    ticket: &NewTicket,
    now: OffsetDateTime,
) -> Result<Ticket, AppError> {
    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start ticket transaction")
            .with_details(e.to_string())
    })?;

    let service = get_service(&tx, ticket.service_id)?;
    let impact = impact_score(&service)?;
    let created_at = canonical_utc(now)?;

    let mut millis = (now.unix_timestamp_nanos() / 1_000_000) as i64;
    let mut incident_id = format!("INC-{millis}");
    while incident_id_taken(&tx, &incident_id)? {
        millis += 1;
        incident_id = format!("INC-{millis}");
    }

    tx.execute(
        r#"
      INSERT INTO tickets (incident_id, title, description, service_id, status, priority, impact_score, created_at)
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
      "#,
        params![
            incident_id,
            ticket.title,
            ticket.description,
            ticket.service_id,
            TicketStatus::Open,
            ticket.priority,
            impact,
            created_at
        ],
    )
    .map_err(|e| {
        AppError::new("DB_INSERT_FAILED", "Failed to insert ticket").with_details(e.to_string())
    })?;
    let id = tx.last_insert_rowid();

    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit ticket transaction")
            .with_details(e.to_string())
    })?;

    tracing::info!(
        ticket_id = id,
        incident_id = incident_id.as_str(),
        service = service.name.as_str(),
        impact_score = impact,
        "ticket created"
    );
    get_ticket(conn, id)
}

/// Move an unresolved ticket between the working states (`Open`, `In Progress`, `Diagnosing`).
///
/// Resolution has its own entry point because it must record a root cause and timestamp.
pub fn update_ticket_status(
    conn: &Connection,
    id: i64,
    status: TicketStatus,
) -> Result<Ticket, AppError> {
    if status.is_resolved() {
        return Err(AppError::new(
            "VALIDATION_RESOLVE_REQUIRES_ROOT_CAUSE",
            "Use the resolve operation to mark a ticket Resolved",
        ));
    }
    let current = get_ticket(conn, id)?;
    if current.status.is_resolved() {
        return Err(AppError::new(
            "TICKET_ALREADY_RESOLVED_CONFLICT",
            "Resolved tickets cannot change status",
        )
        .with_details(format!("incident_id={}", current.incident_id)));
    }

    conn.execute(
        "UPDATE tickets SET status = ?1 WHERE id = ?2",
        params![status, id],
    )
    .map_err(|e| {
        AppError::new("DB_UPDATE_FAILED", "Failed to update ticket status")
            .with_details(e.to_string())
    })?;

    tracing::info!(ticket_id = id, from = %current.status, to = %status, "ticket status changed");
    get_ticket(conn, id)
}

/// Resolve a ticket: the only write that sets `resolved_at`, `root_cause` and
/// `root_cause_category`.
pub fn resolve_ticket(
    conn: &mut Connection,
    id: i64,
    resolution: &ResolveTicket,
    now: OffsetDateTime,
) -> Result<Ticket, AppError> {
    validate_resolution(resolution)?;

    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start resolve transaction")
            .with_details(e.to_string())
    })?;

    let current = get_ticket(&tx, id)?;
    if current.status.is_resolved() {
        return Err(AppError::new(
            "TICKET_ALREADY_RESOLVED_CONFLICT",
            "Ticket is already resolved",
        )
        .with_details(format!("incident_id={}", current.incident_id)));
    }

    let created = parse_rfc3339("created_at", &current.created_at)?;
    if now < created {
        return Err(AppError::new(
            "VALIDATION_TS_ORDER_VIOLATION",
            "Resolution time must not precede creation time",
        )
        .with_details(format!("created_at={}; resolved_at={now}", current.created_at)));
    }
    let resolved_at = canonical_utc(now)?;

    let category = resolution
        .root_cause_category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    tx.execute(
        r#"
      UPDATE tickets
      SET status = ?1, resolved_at = ?2, root_cause = ?3, root_cause_category = ?4
      WHERE id = ?5
      "#,
        params![
            TicketStatus::Resolved,
            resolved_at,
            resolution.root_cause.trim(),
            category,
            id
        ],
    )
    .map_err(|e| {
        AppError::new("DB_UPDATE_FAILED", "Failed to resolve ticket").with_details(e.to_string())
    })?;

    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit resolve transaction")
            .with_details(e.to_string())
    })?;

    tracing::info!(
        ticket_id = id,
        incident_id = current.incident_id.as_str(),
        "ticket resolved"
    );
    get_ticket(conn, id)
}

/// Set or clear the manual ETA. Blank values clear the override.
pub fn set_eta_override(
    conn: &Connection,
    id: i64,
    eta_override: Option<&str>,
) -> Result<Ticket, AppError> {
    get_ticket(conn, id)?;
    let value = eta_override.map(str::trim).filter(|s| !s.is_empty());

    conn.execute(
        "UPDATE tickets SET eta_override = ?1 WHERE id = ?2",
        params![value, id],
    )
    .map_err(|e| {
        AppError::new("DB_UPDATE_FAILED", "Failed to update ETA override")
            .with_details(e.to_string())
    })?;

    get_ticket(conn, id)
}

/// A ticket with its service, ETA, display root cause and the service's workarounds.
pub fn get_ticket_detail(
    conn: &Connection,
    id: i64,
    hints: &RootCauseHints,
) -> Result<TicketDetail, AppError> {
    let ticket = get_ticket(conn, id)?;
    let service = get_service(conn, ticket.service_id)?;
    let eta_display = estimate_eta(
        conn,
        ticket.service_id,
        ticket.priority,
        ticket.eta_override.as_deref(),
    )?;
    let root_cause_display = hints.display(ticket.root_cause.as_deref(), &service.category);
    let alternatives = list_alternatives_for_service(conn, ticket.service_id)?;

    Ok(TicketDetail {
        ticket,
        service_name: service.name,
        service_category: service.category,
        criticality_score: service.criticality_score,
        user_count_estimate: service.user_count_estimate,
        root_cause_display,
        eta_display,
        alternatives,
    })
}
