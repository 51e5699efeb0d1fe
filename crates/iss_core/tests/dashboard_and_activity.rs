use pretty_assertions::assert_eq;
use rusqlite::Connection;
use time::macros::datetime;
use time::Duration;

use iss_core::analytics::{
    build_dashboard_stats, list_active_impacts, recent_activity, ActivityKind, ACTIVITY_FEED_LEN,
};
use iss_core::db;
use iss_core::domain::{NewAlternative, NewService, NewTicket, Priority, ResolveTicket, TicketStatus};
use iss_core::estimate::{RootCauseHints, DEFAULT_ETA};
use iss_core::repo::{
    create_service, create_ticket, insert_alternative, resolve_ticket, update_ticket_status,
};

fn store() -> Connection {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    conn
}

fn add_service(conn: &Connection, name: &str, category: &str, criticality: i64, users: i64) -> i64 {
    create_service(
        conn,
        &NewService {
            name: name.to_string(),
            category: category.to_string(),
            criticality_score: criticality,
            user_count_estimate: users,
        },
    )
    .expect("service")
    .id
}

fn add_ticket(
    conn: &mut Connection,
    service_id: i64,
    title: &str,
    priority: Priority,
    minute: i64,
) -> i64 {
    create_ticket(
        conn,
        &NewTicket {
            title: title.to_string(),
            description: String::new(),
            service_id,
            priority,
        },
        datetime!(2026-05-01 06:00:00 UTC) + Duration::minutes(minute),
    )
    .expect("ticket")
    .id
}

fn resolve_at(conn: &mut Connection, id: i64, minute: i64) {
    resolve_ticket(
        conn,
        id,
        &ResolveTicket {
            root_cause: "Config drift".to_string(),
            root_cause_category: Some("DevOps".to_string()),
        },
        datetime!(2026-05-01 06:00:00 UTC) + Duration::minutes(minute),
    )
    .expect("resolve");
}

#[test]
fn empty_store_yields_zeroed_dashboard() {
    let conn = store();
    let stats = build_dashboard_stats(&conn).expect("stats");
    assert_eq!(stats.total_open, 0);
    assert_eq!(stats.avg_resolution_hours, 0.0);
    assert_eq!(stats.critical_tickets, 0);
    assert!(stats.affected_services.is_empty());
    assert!(recent_activity(&conn, ACTIVITY_FEED_LEN).expect("activity").is_empty());
}

#[test]
fn dashboard_counts_unresolved_and_is_stable_across_calls() {
    let mut conn = store();
    let mail = add_service(&conn, "Mail", "Communication", 5, 100);
    let wifi = add_service(&conn, "WiFi", "Network", 3, 60);

    add_ticket(&mut conn, mail, "a", Priority::Critical, 0);
    let b = add_ticket(&mut conn, mail, "b", Priority::Critical, 1);
    let c = add_ticket(&mut conn, wifi, "c", Priority::Low, 2);
    update_ticket_status(&conn, c, TicketStatus::Diagnosing).expect("status");
    let d = add_ticket(&mut conn, wifi, "d", Priority::High, 3);
    resolve_at(&mut conn, b, 61); // 1h
    resolve_at(&mut conn, d, 183); // 3h

    let first = build_dashboard_stats(&conn).expect("stats");
    assert_eq!(first.total_open, 2);
    assert_eq!(first.critical_tickets, 1);
    assert_eq!(first.avg_resolution_hours, 2.0);
    let names: Vec<(&str, i64)> = first
        .affected_services
        .iter()
        .map(|s| (s.name.as_str(), s.ticket_count))
        .collect();
    assert_eq!(names, vec![("Mail", 1), ("WiFi", 1)]);

    let second = build_dashboard_stats(&conn).expect("stats");
    assert_eq!(first, second);
}

#[test]
fn affected_services_are_sorted_and_capped_at_five() {
    let mut conn = store();
    for (n, open) in [1, 4, 2, 6, 3, 5, 1].into_iter().enumerate() {
        let svc = add_service(&conn, &format!("svc-{n}"), "Server", 2, 10);
        for i in 0..open {
            add_ticket(&mut conn, svc, "load", Priority::Low, i);
        }
    }

    let stats = build_dashboard_stats(&conn).expect("stats");
    let counts: Vec<i64> = stats.affected_services.iter().map(|s| s.ticket_count).collect();
    assert_eq!(counts, vec![6, 5, 4, 3, 2]);
    assert_eq!(stats.total_open, 22);
}

#[test]
fn activity_feed_lists_newest_five() {
    let mut conn = store();
    let svc = add_service(&conn, "Portal", "External", 4, 800);
    for minute in 0..7 {
        add_ticket(&mut conn, svc, &format!("ticket {minute}"), Priority::Medium, minute);
    }

    let feed = recent_activity(&conn, ACTIVITY_FEED_LEN).expect("activity");
    let titles: Vec<&str> = feed.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["ticket 6", "ticket 5", "ticket 4", "ticket 3", "ticket 2"]
    );
    assert!(feed.iter().all(|e| e.kind == ActivityKind::Created));
    assert_eq!(feed[0].time, "2026-05-01T06:06:00Z");
}

#[test]
fn active_impacts_rank_by_impact_with_enrichment() {
    let mut conn = store();
    let mail = add_service(&conn, "Mail", "Communication", 5, 4500);
    let wifi = add_service(&conn, "WiFi", "Network", 3, 600);
    insert_alternative(
        &conn,
        &NewAlternative {
            service_id: wifi,
            issue_type: "Network".to_string(),
            description: "Use the guest network.".to_string(),
        },
    )
    .expect("alt");

    let low = add_ticket(&mut conn, wifi, "WiFi drops", Priority::Medium, 0);
    let high = add_ticket(&mut conn, mail, "Mail down", Priority::Critical, 1);
    let gone = add_ticket(&mut conn, mail, "Mail slow", Priority::Low, 2);
    resolve_at(&mut conn, gone, 30);

    let impacts = list_active_impacts(&conn, &RootCauseHints::default()).expect("impacts");
    let order: Vec<i64> = impacts.iter().map(|i| i.ticket.id).collect();
    assert_eq!(order, vec![high, low]);

    let wifi_row = &impacts[1];
    assert_eq!(wifi_row.service_name, "WiFi");
    assert_eq!(wifi_row.root_cause_display, "Upstream ISP Packet Loss");
    assert_eq!(wifi_row.eta_display, DEFAULT_ETA);
    assert_eq!(wifi_row.alternatives.len(), 1);
    assert!(impacts[0].alternatives.is_empty());
}
