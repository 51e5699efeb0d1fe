//! HTTP API for the impact support dashboard.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use anyhow::{Context, Result};
use axum::routing::{get, post, put};
use axum::Router;
use iss_core::db;
use iss_core::demo::seed_demo_dataset;
use iss_core::error::ErrorCategory;
use rusqlite::Connection;
use time::OffsetDateTime;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/active-impacts", get(handlers::active_impacts))
        .route("/api/search-deflection", get(handlers::deflection))
        .route("/api/activity-log", get(handlers::activity_log))
        .route("/api/dashboard", get(handlers::dashboard))
        .route(
            "/api/tickets",
            get(handlers::list_tickets).post(handlers::create_ticket),
        )
        .route("/api/tickets/:id", get(handlers::get_ticket))
        .route("/api/tickets/:id/status", post(handlers::update_status))
        .route("/api/tickets/:id/resolve", post(handlers::resolve))
        .route("/api/tickets/:id/eta-override", put(handlers::eta_override))
        .route(
            "/api/services",
            get(handlers::services).post(handlers::create_service),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Open and migrate the store described by `config`, seeding demo data when asked to.
///
/// Seeding is skipped (with a log line) when the store already holds data.
pub fn open_store(config: &ServerConfig) -> Result<Connection> {
    let mut conn = if config.in_memory {
        let mut conn = db::open_in_memory()?;
        db::migrate(&mut conn)?;
        conn
    } else {
        db::open_and_migrate(&config.db_path)
            .with_context(|| format!("failed to open store at {}", config.db_path.display()))?
    };

    if config.seed_demo {
        match seed_demo_dataset(&mut conn, OffsetDateTime::now_utc()) {
            Ok(summary) => info!(
                services = summary.services,
                tickets = summary.active_tickets + summary.resolved_tickets,
                "demo data seeded"
            ),
            Err(err) if err.category() == ErrorCategory::Conflict => {
                info!(code = err.code.as_str(), "store already has data; skipping demo seed");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(conn)
}

/// Build shared state from config in one step.
pub fn app_state(config: ServerConfig) -> Result<AppState> {
    let conn = open_store(&config)?;
    Ok(AppState::new(conn, config))
}
