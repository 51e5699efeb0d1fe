use pretty_assertions::assert_eq;
use rusqlite::Connection;
use time::macros::datetime;

use iss_core::db;
use iss_core::domain::{NewService, NewTicket, Priority, TicketStatus};
use iss_core::repo::{count_tickets, create_service, create_ticket, get_ticket};
use iss_core::validate::{validate_ticket_draft, TicketDraft};

fn store() -> Connection {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    conn
}

fn service(conn: &Connection, name: &str, criticality: i64, users: i64) -> i64 {
    create_service(
        conn,
        &NewService {
            name: name.to_string(),
            category: "Network".to_string(),
            criticality_score: criticality,
            user_count_estimate: users,
        },
    )
    .expect("service")
    .id
}

fn new_ticket(service_id: i64, title: &str) -> NewTicket {
    NewTicket {
        title: title.to_string(),
        description: "Users cannot connect".to_string(),
        service_id,
        priority: Priority::High,
    }
}

#[test]
fn impact_score_is_criticality_times_users() {
    let mut conn = store();
    let vpn = service(&conn, "Test VPN", 4, 100);

    let ticket = create_ticket(
        &mut conn,
        &new_ticket(vpn, "VPN down"),
        datetime!(2026-03-01 09:00:00 UTC),
    )
    .expect("create");

    assert_eq!(ticket.impact_score, 400);
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.created_at, "2026-03-01T09:00:00Z");
    assert!(ticket.incident_id.starts_with("INC-"));
    assert_eq!(ticket.resolved_at, None);
    assert_eq!(ticket.root_cause, None);
    assert_eq!(get_ticket(&conn, ticket.id).expect("reload"), ticket);
}

#[test]
fn impact_is_fixed_at_creation_for_every_service_shape() {
    let mut conn = store();
    for (i, (criticality, users)) in [(1, 0), (2, 37), (5, 4500), (3, 1)].into_iter().enumerate() {
        let id = service(&conn, &format!("svc-{i}"), criticality, users);
        let ticket = create_ticket(
            &mut conn,
            &new_ticket(id, "outage"),
            datetime!(2026-03-01 09:00:00 UTC),
        )
        .expect("create");
        assert_eq!(ticket.impact_score, criticality * users);
    }
}

#[test]
fn draft_without_service_id_is_rejected_before_any_write() {
    let conn = store();
    let before = count_tickets(&conn).expect("count");

    let err = validate_ticket_draft(&TicketDraft {
        title: Some("Printer on fire".to_string()),
        description: None,
        service_id: None,
        priority: Some("Low".to_string()),
    })
    .unwrap_err();

    assert_eq!(err.code, "VALIDATION_MISSING_FIELD");
    assert_eq!(count_tickets(&conn).expect("count"), before);
}

#[test]
fn unknown_service_is_not_found_and_nothing_is_written() {
    let mut conn = store();
    let err = create_ticket(
        &mut conn,
        &new_ticket(424242, "ghost"),
        datetime!(2026-03-01 09:00:00 UTC),
    )
    .unwrap_err();

    assert_eq!(err.code, "SERVICE_NOT_FOUND");
    assert_eq!(count_tickets(&conn).expect("count"), 0);
}

#[test]
fn incident_ids_stay_unique_when_created_in_the_same_millisecond() {
    let mut conn = store();
    let vpn = service(&conn, "Test VPN", 4, 100);
    let now = datetime!(2026-03-01 09:00:00.123 UTC);

    let mut ids = Vec::new();
    for i in 0..5 {
        let t = create_ticket(&mut conn, &new_ticket(vpn, &format!("burst {i}")), now)
            .expect("create");
        ids.push(t.incident_id);
    }

    let mut deduped = ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), ids.len(), "duplicate incident ids: {ids:?}");
    assert_eq!(ids[0], format!("INC-{}", 1_772_355_600_123_i64));
}
