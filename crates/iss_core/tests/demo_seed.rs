use tempfile::tempdir;
use time::macros::datetime;

use iss_core::analytics::{build_dashboard_stats, list_active_impacts};
use iss_core::db;
use iss_core::demo::{seed_demo_dataset, HISTORICAL_TICKETS};
use iss_core::estimate::RootCauseHints;
use iss_core::repo::count_tickets;

#[test]
fn seeds_demo_dataset_with_enough_history_for_dashboards() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("demo.sqlite");
    let mut conn = db::open_and_migrate(&db_path).expect("open");

    let summary = seed_demo_dataset(&mut conn, datetime!(2026-07-01 12:00:00 UTC)).expect("seed");
    assert_eq!(summary.resolved_tickets, HISTORICAL_TICKETS);
    assert_eq!(
        count_tickets(&conn).expect("count") as usize,
        summary.active_tickets + summary.resolved_tickets
    );

    let stats = build_dashboard_stats(&conn).expect("stats");
    assert_eq!(stats.total_open, 3);
    assert_eq!(stats.critical_tickets, 1);
    assert!(
        stats.avg_resolution_hours >= 1.0 && stats.avg_resolution_hours <= 6.0,
        "unexpected average: {}",
        stats.avg_resolution_hours
    );

    let impacts = list_active_impacts(&conn, &RootCauseHints::default()).expect("impacts");
    assert_eq!(impacts[0].ticket.incident_id, "INC-2025-001");
    assert_eq!(impacts[0].eta_display, "45 mins");
    assert!(!impacts[0].alternatives.is_empty());
}

#[test]
fn seeding_twice_is_refused() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    let now = datetime!(2026-07-01 12:00:00 UTC);

    seed_demo_dataset(&mut conn, now).expect("seed");
    let err = seed_demo_dataset(&mut conn, now).unwrap_err();
    assert_eq!(err.code, "DEMO_SEED_CONFLICT");
}
