use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::domain::{NewAlternative, NewService, Priority, TicketStatus};
use crate::error::AppError;
use crate::normalize::timestamps::canonical_utc;
use crate::repo::{count_tickets, create_service, insert_alternative, list_services};

const SERVICES: [(&str, &str, i64, i64); 7] = [
    ("Corporate Email (Exchange)", "Communication", 5, 4500),
    ("VPN Gateway - US East", "Network", 4, 1200),
    ("Payroll System (SAP)", "Finance", 5, 400),
    ("Customer Support Portal", "External", 4, 8000),
    ("Office WiFi (HQ)", "Network", 3, 600),
    ("JIRA Issue Tracker", "DevOps", 3, 300),
    ("Slack Messaging", "Communication", 2, 4500),
];

const ALTERNATIVES: [(usize, &str, &str); 4] = [
    (0, "Server", "Use Outlook Web Access (OWA) via the backup URL."),
    (1, "Network", "Connect to VPN Gateway - US West."),
    (2, "Database", "Manual timesheet entry forms are available on the Intranet."),
    (4, "Network", "Use the \"Guest\" network or hardline ethernet if available."),
];

struct ActiveSeed {
    incident_id: &'static str,
    title: &'static str,
    description: &'static str,
    service: usize,
    status: TicketStatus,
    priority: Priority,
    impact_score: i64,
    minutes_ago: i64,
    eta_override: Option<&'static str>,
}

const ACTIVE: [ActiveSeed; 3] = [
    ActiveSeed {
        incident_id: "INC-2025-001",
        title: "Outlook Disconnected for Remote Users",
        description: "Users reporting inability to send/receive emails when connected via VPN. Exchange server responding slowly.",
        service: 0,
        status: TicketStatus::InProgress,
        priority: Priority::Critical,
        impact_score: 95,
        minutes_ago: 120,
        eta_override: Some("45 mins"),
    },
    ActiveSeed {
        incident_id: "INC-2025-002",
        title: "VPN Auth Timeout",
        description: "Authentication server is timing out for the US East gateway. 500 error returned.",
        service: 1,
        status: TicketStatus::Diagnosing,
        priority: Priority::High,
        impact_score: 80,
        minutes_ago: 30,
        eta_override: None,
    },
    ActiveSeed {
        incident_id: "INC-2025-003",
        title: "WiFi Intermittent in Main Lobby",
        description: "Signal dropping in and out. AP reboot required.",
        service: 4,
        status: TicketStatus::Open,
        priority: Priority::Medium,
        impact_score: 40,
        minutes_ago: 240,
        eta_override: None,
    },
];

pub const HISTORICAL_TICKETS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoSeedSummary {
    pub services: usize,
    pub alternatives: usize,
    pub active_tickets: usize,
    pub resolved_tickets: usize,
}

struct SeedTicket<'a> {
    incident_id: &'a str,
    title: &'a str,
    description: &'a str,
    service_id: i64,
    status: TicketStatus,
    priority: Priority,
    impact_score: i64,
    created_at: &'a str,
    resolved_at: Option<&'a str>,
    root_cause: Option<&'a str>,
    root_cause_category: Option<&'a str>,
    eta_override: Option<&'a str>,
}

fn insert_seed_ticket(conn: &Connection, seed: &SeedTicket<'_>) -> Result<(), AppError> {
    conn.execute(
        r#"
      INSERT INTO tickets (
        incident_id, title, description, service_id, status, priority, impact_score,
        created_at, resolved_at, root_cause, root_cause_category, eta_override
      ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
      "#,
        params![
            seed.incident_id,
            seed.title,
            seed.description,
            seed.service_id,
            seed.status,
            seed.priority,
            seed.impact_score,
            seed.created_at,
            seed.resolved_at,
            seed.root_cause,
            seed.root_cause_category,
            seed.eta_override
        ],
    )
    .map_err(|e| {
        AppError::new("DB_INSERT_FAILED", "Failed to insert demo ticket")
            .with_details(format!("incident_id={}; err={e}", seed.incident_id))
    })?;
    Ok(())
}

/// Seed the demo dataset: services, workarounds, three live incidents and a deterministic
/// history of resolved tickets (1 to 6 hour resolutions) so ETAs and averages have data.
///
/// All timestamps are relative to `now`. Refuses to run against a store that already has
/// services or tickets.
pub fn seed_demo_dataset(
    conn: &mut Connection,
    now: OffsetDateTime,
) -> Result<DemoSeedSummary, AppError> {
    if count_tickets(conn)? > 0 || !list_services(conn)?.is_empty() {
        return Err(AppError::new(
            "DEMO_SEED_CONFLICT",
            "Demo data can only be seeded into an empty store",
        ));
    }

    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start demo seed transaction")
            .with_details(e.to_string())
    })?;

    let mut service_ids = Vec::with_capacity(SERVICES.len());
    for (name, category, criticality_score, user_count_estimate) in SERVICES {
        let service = create_service(
            &tx,
            &NewService {
                name: name.to_string(),
                category: category.to_string(),
                criticality_score,
                user_count_estimate,
            },
        )?;
        service_ids.push(service.id);
    }

    for (service, issue_type, description) in ALTERNATIVES {
        insert_alternative(
            &tx,
            &NewAlternative {
                service_id: service_ids[service],
                issue_type: issue_type.to_string(),
                description: description.to_string(),
            },
        )?;
    }

    for seed in &ACTIVE {
        let created_at = canonical_utc(now - Duration::minutes(seed.minutes_ago))?;
        insert_seed_ticket(
            &tx,
            &SeedTicket {
                incident_id: seed.incident_id,
                title: seed.title,
                description: seed.description,
                service_id: service_ids[seed.service],
                status: seed.status,
                priority: seed.priority,
                impact_score: seed.impact_score,
                created_at: &created_at,
                resolved_at: None,
                root_cause: None,
                root_cause_category: None,
                eta_override: seed.eta_override,
            },
        )?;
    }

    for i in 0..HISTORICAL_TICKETS {
        let service = i % SERVICES.len();
        let i = i as i64;
        // Created 24h to ~5 days ago, resolved 60 to 359 minutes later.
        let created = now - Duration::hours(24 + (i * 7) % 100);
        let resolved = created + Duration::minutes(60 + (i * 37) % 300);
        let priority = if i % 5 == 0 {
            Priority::High
        } else {
            Priority::Low
        };

        let incident_id = format!("INC-HIST-{}", 1000 + i);
        let title = format!("Legacy Issue: {} latency", SERVICES[service].0);
        let created_at = canonical_utc(created)?;
        let resolved_at = canonical_utc(resolved)?;
        insert_seed_ticket(
            &tx,
            &SeedTicket {
                incident_id: &incident_id,
                title: &title,
                description: "Historical ticket for data population.",
                service_id: service_ids[service],
                status: TicketStatus::Resolved,
                priority,
                impact_score: (i * 13) % 50,
                created_at: &created_at,
                resolved_at: Some(&resolved_at),
                root_cause: Some("High CPU Load"),
                root_cause_category: Some("Server"),
                eta_override: None,
            },
        )?;
    }

    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit demo seed transaction")
            .with_details(e.to_string())
    })?;

    let summary = DemoSeedSummary {
        services: SERVICES.len(),
        alternatives: ALTERNATIVES.len(),
        active_tickets: ACTIVE.len(),
        resolved_tickets: HISTORICAL_TICKETS,
    };
    tracing::info!(?summary, "seeded demo dataset");
    Ok(summary)
}
