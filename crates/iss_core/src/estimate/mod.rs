use std::collections::{BTreeMap, HashMap};

use rusqlite::Connection;

use crate::domain::{Priority, Service, TicketStatus};
use crate::error::AppError;
use crate::normalize::timestamps::elapsed_seconds;

/// Shown when a (service, priority) pair has no resolved history and no manual override.
pub const DEFAULT_ETA: &str = "2 hours (est)";

pub const PENDING_ROOT_CAUSE: &str = "Pending Analysis";

const BUILTIN_ROOT_CAUSE_HINTS: [(&str, &str); 6] = [
    ("Network", "Upstream ISP Packet Loss"),
    ("Communication", "Mail Transport Queue Backlog"),
    ("Finance", "Database Lock Contention"),
    ("External", "Third-party API Degradation"),
    ("DevOps", "Failed Deployment Rollout"),
    ("Server", "High CPU Load"),
];

/// Business impact of an incident against `service`: criticality weight times affected users.
pub fn impact_score(service: &Service) -> Result<i64, AppError> {
    service
        .criticality_score
        .checked_mul(service.user_count_estimate)
        .filter(|score| *score >= 0)
        .ok_or_else(|| {
            AppError::new(
                "VALIDATION_IMPACT_OUT_OF_RANGE",
                "Impact score cannot be represented for this service",
            )
            .with_details(format!(
                "criticality_score={}; user_count_estimate={}",
                service.criticality_score, service.user_count_estimate
            ))
        })
}

/// Render a mean resolution time.
///
/// Under an hour the value is shown in whole minutes; from an hour up it is shown in hours with
/// one decimal, dropping a trailing `.0`.
pub fn format_eta(mean_seconds: f64) -> String {
    let minutes = (mean_seconds / 60.0).round() as i64;
    if minutes < 60 {
        return match minutes.max(1) {
            1 => "1 min".to_string(),
            m => format!("{m} mins"),
        };
    }

    let hours = (mean_seconds / 3600.0 * 10.0).round() / 10.0;
    if hours == 1.0 {
        "1 hour".to_string()
    } else if hours.fract() == 0.0 {
        format!("{} hours", hours as i64)
    } else {
        format!("{hours:.1} hours")
    }
}

fn usable_override(eta_override: Option<&str>) -> Option<&str> {
    eta_override.map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Default, Clone, Copy)]
struct MeanAccumulator {
    total_seconds: f64,
    samples: u32,
}

impl MeanAccumulator {
    fn push(&mut self, created_at: &str, resolved_at: &str) {
        match elapsed_seconds(created_at, resolved_at) {
            Some(secs) => {
                self.total_seconds += secs as f64;
                self.samples += 1;
            }
            None => tracing::warn!(
                created_at,
                resolved_at,
                "skipping resolved ticket with unusable timestamps"
            ),
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.samples == 0 {
            None
        } else {
            Some(self.total_seconds / f64::from(self.samples))
        }
    }
}

/// Mean `resolved_at - created_at` in seconds over resolved tickets of one (service, priority).
pub fn historical_mean_seconds(
    conn: &Connection,
    service_id: i64,
    priority: Priority,
) -> Result<Option<f64>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
      SELECT created_at, resolved_at
      FROM tickets
      WHERE service_id = ?1 AND priority = ?2 AND status = ?3 AND resolved_at IS NOT NULL
      "#,
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare resolution history query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map(
            rusqlite::params![service_id, priority, TicketStatus::Resolved],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query resolution history")
                .with_details(e.to_string())
        })?;

    let mut acc = MeanAccumulator::default();
    for r in rows {
        let (created_at, resolved_at) = r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode resolution history row")
                .with_details(e.to_string())
        })?;
        acc.push(&created_at, &resolved_at);
    }
    Ok(acc.mean())
}

/// Estimated time to resolution for a single ticket.
///
/// A non-blank manual override always wins; otherwise the historical mean for the same service
/// and priority is rendered; with no history the fixed `DEFAULT_ETA` is returned.
pub fn estimate_eta(
    conn: &Connection,
    service_id: i64,
    priority: Priority,
    eta_override: Option<&str>,
) -> Result<String, AppError> {
    if let Some(manual) = usable_override(eta_override) {
        return Ok(manual.to_string());
    }
    Ok(match historical_mean_seconds(conn, service_id, priority)? {
        Some(mean) => format_eta(mean),
        None => DEFAULT_ETA.to_string(),
    })
}

/// Resolution history for every (service, priority) pair, loaded with one query.
///
/// Used by list views so ETA estimation does not issue a query per ticket.
#[derive(Debug, Default, Clone)]
pub struct EtaHistory {
    means: HashMap<(i64, Priority), f64>,
}

impl EtaHistory {
    pub fn load(conn: &Connection) -> Result<Self, AppError> {
        let mut stmt = conn
            .prepare(
                r#"
      SELECT service_id, priority, created_at, resolved_at
      FROM tickets
      WHERE status = ?1 AND resolved_at IS NOT NULL
      "#,
            )
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to prepare resolution history query")
                    .with_details(e.to_string())
            })?;

        let rows = stmt
            .query_map([TicketStatus::Resolved], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Priority>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to query resolution history")
                    .with_details(e.to_string())
            })?;

        let mut acc: HashMap<(i64, Priority), MeanAccumulator> = HashMap::new();
        for r in rows {
            let (service_id, priority, created_at, resolved_at) = r.map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to decode resolution history row")
                    .with_details(e.to_string())
            })?;
            acc.entry((service_id, priority))
                .or_default()
                .push(&created_at, &resolved_at);
        }

        let means = acc
            .into_iter()
            .filter_map(|(key, a)| a.mean().map(|m| (key, m)))
            .collect();
        Ok(Self { means })
    }

    pub fn eta_for(&self, service_id: i64, priority: Priority, eta_override: Option<&str>) -> String {
        if let Some(manual) = usable_override(eta_override) {
            return manual.to_string();
        }
        match self.means.get(&(service_id, priority)) {
            Some(mean) => format_eta(*mean),
            None => DEFAULT_ETA.to_string(),
        }
    }
}

/// Default root-cause phrases keyed by service category.
///
/// This is display flavor for tickets without a recorded root cause, not a diagnostic. Lookups
/// are case-insensitive on the category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCauseHints {
    by_category: BTreeMap<String, String>,
    fallback: String,
}

impl Default for RootCauseHints {
    fn default() -> Self {
        Self {
            by_category: BUILTIN_ROOT_CAUSE_HINTS
                .iter()
                .map(|(c, p)| (c.to_lowercase(), p.to_string()))
                .collect(),
            fallback: PENDING_ROOT_CAUSE.to_string(),
        }
    }
}

impl RootCauseHints {
    /// Add or replace category phrases on top of the current table.
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (category, phrase) in overrides {
            self.by_category
                .insert(category.as_ref().trim().to_lowercase(), phrase.into());
        }
        self
    }

    pub fn hint_for_category(&self, category: &str) -> &str {
        self.by_category
            .get(&category.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }

    pub fn display(&self, root_cause: Option<&str>, category: &str) -> String {
        match root_cause.map(str::trim).filter(|s| !s.is_empty()) {
            Some(recorded) => recorded.to_string(),
            None => self.hint_for_category(category).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(criticality: i64, users: i64) -> Service {
        Service {
            id: 1,
            name: "Test VPN".to_string(),
            category: "Network".to_string(),
            criticality_score: criticality,
            user_count_estimate: users,
        }
    }

    #[test]
    fn impact_is_criticality_times_users() {
        assert_eq!(impact_score(&service(4, 100)).unwrap(), 400);
        assert_eq!(impact_score(&service(5, 0)).unwrap(), 0);
    }

    #[test]
    fn impact_overflow_is_rejected() {
        let err = impact_score(&service(5, i64::MAX)).unwrap_err();
        assert_eq!(err.code, "VALIDATION_IMPACT_OUT_OF_RANGE");
    }

    #[test]
    fn eta_formatting_switches_units_at_one_hour() {
        assert_eq!(format_eta(10.0), "1 min");
        assert_eq!(format_eta(45.0 * 60.0), "45 mins");
        assert_eq!(format_eta(59.6 * 60.0), "1 hour");
        assert_eq!(format_eta(2.0 * 3600.0), "2 hours");
        assert_eq!(format_eta(2.5 * 3600.0), "2.5 hours");
        assert_eq!(format_eta(100.0 * 60.0), "1.7 hours");
    }

    #[test]
    fn blank_override_is_ignored() {
        let history = EtaHistory::default();
        assert_eq!(history.eta_for(1, Priority::High, Some("   ")), DEFAULT_ETA);
        assert_eq!(history.eta_for(1, Priority::High, Some("45 mins")), "45 mins");
    }

    #[test]
    fn root_cause_hints_prefer_recorded_cause() {
        let hints = RootCauseHints::default();
        assert_eq!(hints.display(Some("Bad Deployment"), "Network"), "Bad Deployment");
        assert_eq!(hints.display(None, "network"), "Upstream ISP Packet Loss");
        assert_eq!(hints.display(Some(""), "Unknown"), PENDING_ROOT_CAUSE);
    }

    #[test]
    fn root_cause_overrides_replace_builtins() {
        let hints = RootCauseHints::default()
            .with_overrides([("NETWORK", "Core Switch Failure"), ("Storage", "SAN Latency")]);
        assert_eq!(hints.hint_for_category("Network"), "Core Switch Failure");
        assert_eq!(hints.hint_for_category("storage"), "SAN Latency");
    }
}
