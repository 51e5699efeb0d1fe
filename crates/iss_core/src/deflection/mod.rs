use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::domain::TicketStatus;
use crate::error::AppError;

pub const MIN_QUERY_CHARS: usize = 3;
pub const MAX_INCIDENT_MATCHES: i64 = 3;
pub const MAX_SUGGESTIONS: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentMatch {
    pub id: i64,
    pub incident_id: String,
    pub title: String,
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkaroundSuggestion {
    pub description: String,
    pub service_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeflectionResult {
    pub existing_incidents: Vec<IncidentMatch>,
    pub suggestions: Vec<WorkaroundSuggestion>,
}

/// `%q%` with LIKE metacharacters escaped so user input matches literally (escape char `\`).
fn like_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// Suggest open incidents and known workarounds that match a free-text query.
///
/// Queries shorter than `MIN_QUERY_CHARS` (after trimming) return empty results. Matching is a
/// case-insensitive substring match (ASCII case folding, as SQLite's LIKE does). Open incidents
/// are matched on title and description and returned most recent first; workarounds are matched
/// on service name, issue type and description.
pub fn search_deflection(
    conn: &Connection,
    query: Option<&str>,
) -> Result<DeflectionResult, AppError> {
    let Some(q) = query.map(str::trim) else {
        return Ok(DeflectionResult::default());
    };
    if q.chars().count() < MIN_QUERY_CHARS {
        return Ok(DeflectionResult::default());
    }
    let pattern = like_pattern(q);

    let mut stmt = conn
        .prepare(
            r#"
      SELECT t.id, t.incident_id, t.title, t.status
      FROM tickets t
      WHERE t.status != ?1
        AND (t.title LIKE ?2 ESCAPE '\' OR t.description LIKE ?2 ESCAPE '\')
      ORDER BY t.created_at DESC, t.id DESC
      LIMIT ?3
      "#,
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare deflection ticket query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map(
            params![TicketStatus::Resolved, pattern, MAX_INCIDENT_MATCHES],
            |row| {
                Ok(IncidentMatch {
                    id: row.get(0)?,
                    incident_id: row.get(1)?,
                    title: row.get(2)?,
                    status: row.get(3)?,
                })
            },
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query matching tickets")
                .with_details(e.to_string())
        })?;

    let mut existing_incidents = Vec::new();
    for r in rows {
        existing_incidents.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode matching ticket row")
                .with_details(e.to_string())
        })?);
    }

    let mut stmt = conn
        .prepare(
            r#"
      SELECT a.description, s.name
      FROM alternatives a
      JOIN services s ON a.service_id = s.id
      WHERE s.name LIKE ?1 ESCAPE '\'
         OR a.issue_type LIKE ?1 ESCAPE '\'
         OR a.description LIKE ?1 ESCAPE '\'
      ORDER BY a.id ASC
      LIMIT ?2
      "#,
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare deflection workaround query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map(params![pattern, MAX_SUGGESTIONS], |row| {
            Ok(WorkaroundSuggestion {
                description: row.get(0)?,
                service_name: row.get(1)?,
            })
        })
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query matching workarounds")
                .with_details(e.to_string())
        })?;

    let mut suggestions = Vec::new();
    for r in rows {
        suggestions.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode workaround row")
                .with_details(e.to_string())
        })?);
    }

    tracing::debug!(
        query = q,
        incidents = existing_incidents.len(),
        suggestions = suggestions.len(),
        "deflection search"
    );

    Ok(DeflectionResult {
        existing_incidents,
        suggestions,
    })
}
